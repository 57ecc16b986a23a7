//! Backward allocator assignment.

use super::chain::Stage;

/// Where a stage writes its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocTarget {
    /// The caller's output buffers.
    Output,
    /// The stage's scratch buffer.
    Scratch,
}

/// Allocation decision for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageAlloc {
    /// Buffer the stage writes when it does not run in place.
    pub target: AllocTarget,
    /// The stage overwrites its input instead of writing `target`.
    pub in_place: bool,
}

/// Walk the stages last to first, deciding each stage's target.
///
/// The final stage writes straight into the output when no pack follows.
/// A stage that passes its allocator lets its predecessor inherit the same
/// target; otherwise the predecessor falls back to scratch memory.
pub(crate) fn assign_allocators(stages: &[Stage], out_default: bool) -> Vec<StageAlloc> {
    let mut state = if out_default {
        StageAlloc {
            target: AllocTarget::Output,
            in_place: false,
        }
    } else {
        StageAlloc {
            target: AllocTarget::Scratch,
            in_place: true,
        }
    };

    let mut plan = vec![state; stages.len()];
    for (stage, alloc) in stages.iter().zip(plan.iter_mut()).rev() {
        *alloc = StageAlloc {
            target: state.target,
            in_place: state.in_place && stage.allow_in_place,
        };
        if !stage.pass_alloc {
            state = StageAlloc {
                target: AllocTarget::Scratch,
                in_place: true,
            };
        }
    }
    plan
}
