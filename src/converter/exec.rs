//! Demand-driven execution of a built chain.
//!
//! Executing pulls the last stage, which pulls its predecessor first, down to
//! unpack. Each stage's result location is memoized for the duration of one
//! call so a stage never runs twice, and the memo is cleared afterwards.

use crate::error::{Error, Result};
use crate::kernels::{Blocks, BlocksMut, ChannelMix, Planes, Quantizer, convert};

use super::alloc::{AllocTarget, StageAlloc, assign_allocators};
use super::chain::{Chain, Geometry, Stage, StageKind};
use super::scratch::ScratchArena;

/// Where a stage's result lives during one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// The caller's input buffers.
    Input,
    /// The caller's output buffers.
    Output,
    /// Scratch memory owned by the given stage.
    Scratch(usize),
}

/// Caller input, either read-only or free to overwrite.
pub(crate) enum Source<'a> {
    Shared(Blocks<'a>),
    Writable(BlocksMut<'a>),
}

impl Source<'_> {
    pub(crate) fn is_writable(&self) -> bool {
        matches!(self, Source::Writable(_))
    }

    pub(crate) fn block_count(&self) -> usize {
        match self {
            Source::Shared(blocks) => blocks.len(),
            Source::Writable(blocks) => blocks.len(),
        }
    }

    pub(crate) fn block_len(&self, block: usize) -> usize {
        match self {
            Source::Shared(blocks) => blocks[block].len(),
            Source::Writable(blocks) => blocks[block].len(),
        }
    }

    fn view(&self, count: usize, len: usize) -> Result<Blocks<'_>> {
        match self {
            Source::Shared(blocks) => shared(&blocks[..], count, len),
            Source::Writable(blocks) => shared(&blocks[..], count, len),
        }
    }
}

/// Region of a slot a stage touches.
#[derive(Debug, Clone, Copy)]
struct View {
    slot: Slot,
    count: usize,
    len: usize,
}

impl View {
    fn stage(slot: Slot, stage: &Stage, frames: usize) -> Self {
        Self {
            slot,
            count: stage.blocks,
            len: frames * stage.stride,
        }
    }

    fn caller(slot: Slot, geometry: &Geometry, frames: usize) -> Self {
        Self {
            slot,
            count: geometry.blocks,
            len: geometry.len(frames),
        }
    }
}

/// All memory one call may touch.
pub(crate) struct Storage<'a> {
    pub(crate) input: Source<'a>,
    pub(crate) output: BlocksMut<'a>,
    pub(crate) scratch: &'a mut ScratchArena,
}

impl Storage<'_> {
    /// Build the kernel view reading `src` and writing `dst`.
    fn planes(&mut self, src: View, dst: View) -> Result<Planes<'_>> {
        let Storage {
            input,
            output,
            scratch,
        } = self;

        match (src.slot, dst.slot) {
            (Slot::Scratch(a), Slot::Scratch(b)) if a != b => {
                let (s, d) = scratch.pair((a, src.count, src.len), (b, dst.count, dst.len))?;
                Ok(Planes::split(s, d))
            }
            (s, d) if s == d => {
                let count = src.count.max(dst.count);
                let len = src.len.max(dst.len);
                let blocks = match d {
                    Slot::Input => match input {
                        Source::Writable(blocks) => exclusive(&mut blocks[..], count, len)?,
                        Source::Shared(_) => {
                            return Err(Error::Buffer("input buffers are read-only".into()));
                        }
                    },
                    Slot::Output => exclusive(&mut output[..], count, len)?,
                    Slot::Scratch(stage) => scratch.blocks_mut(stage, count, len)?,
                };
                Ok(Planes::in_place(blocks))
            }
            (Slot::Input, Slot::Output) => Ok(Planes::split(
                input.view(src.count, src.len)?,
                exclusive(&mut output[..], dst.count, dst.len)?,
            )),
            (Slot::Input, Slot::Scratch(b)) => Ok(Planes::split(
                input.view(src.count, src.len)?,
                scratch.blocks_mut(b, dst.count, dst.len)?,
            )),
            (Slot::Output, Slot::Scratch(b)) => Ok(Planes::split(
                shared(&output[..], src.count, src.len)?,
                scratch.blocks_mut(b, dst.count, dst.len)?,
            )),
            (Slot::Scratch(a), Slot::Output) => Ok(Planes::split(
                scratch.blocks(a, src.count, src.len)?,
                exclusive(&mut output[..], dst.count, dst.len)?,
            )),
            (s, d) => Err(Error::Buffer(format!("cannot write {d:?} from {s:?}"))),
        }
    }
}

fn shared<B: AsRef<[u8]>>(blocks: &[B], count: usize, len: usize) -> Result<Blocks<'_>> {
    check(blocks.iter().map(|b| b.as_ref().len()), count, len)?;
    Ok(blocks[..count].iter().map(|b| &b.as_ref()[..len]).collect())
}

fn exclusive<'s>(blocks: &'s mut [&mut [u8]], count: usize, len: usize) -> Result<BlocksMut<'s>> {
    check(blocks.iter().map(|b| b.len()), count, len)?;
    Ok(blocks[..count].iter_mut().map(|b| &mut b[..len]).collect())
}

fn check(lens: impl ExactSizeIterator<Item = usize>, count: usize, len: usize) -> Result<()> {
    let available = lens.len();
    if available < count {
        return Err(Error::Buffer(format!(
            "expected {count} blocks, got {available}"
        )));
    }
    if let Some((block, short)) = lens.take(count).enumerate().find(|&(_, l)| l < len) {
        return Err(Error::Buffer(format!(
            "block {block} holds {short} bytes, need {len}"
        )));
    }
    Ok(())
}

/// Stage chain together with its allocation plan and stateful kernels.
#[derive(Debug)]
pub(crate) struct Pipeline {
    chain: Chain,
    plan: Vec<StageAlloc>,
    memo: Vec<Option<Slot>>,
    mix: ChannelMix,
    quantizer: Quantizer,
}

impl Pipeline {
    pub(crate) fn new(chain: Chain, mix: ChannelMix, quantizer: Quantizer) -> Self {
        let plan = assign_allocators(&chain.stages, chain.out_default);
        let memo = vec![None; chain.stages.len()];
        Self {
            chain,
            plan,
            memo,
            mix,
            quantizer,
        }
    }

    pub(crate) fn chain(&self) -> &Chain {
        &self.chain
    }

    pub(crate) fn plan(&self) -> &[StageAlloc] {
        &self.plan
    }

    pub(crate) fn mix(&self) -> &ChannelMix {
        &self.mix
    }

    pub(crate) fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    pub(crate) fn set_quantizer(&mut self, quantizer: Quantizer) {
        self.quantizer = quantizer;
    }

    /// Convert `frames` frames from `storage.input` into `storage.output`.
    pub(crate) fn run(&mut self, storage: &mut Storage<'_>, frames: usize) -> Result<()> {
        let result = self.pull_and_pack(storage, frames);
        self.memo.fill(None);
        result
    }

    fn pull_and_pack(&mut self, storage: &mut Storage<'_>, frames: usize) -> Result<()> {
        let last = self.chain.stages.len() - 1;
        let slot = self.pull(last, storage, frames)?;
        if !self.chain.out_default || slot != Slot::Output {
            let src = View::stage(slot, self.chain.last(), frames);
            let dst = View::caller(Slot::Output, &self.chain.output, frames);
            let mut planes = storage.planes(src, dst)?;
            let output = self.chain.output;
            self.apply(StageKind::Pack, &mut planes, output.blocks, frames * output.inc, frames);
            tracing::trace!("pack {:?} -> Output, {} frames", slot, frames);
        }
        Ok(())
    }

    fn pull(&mut self, index: usize, storage: &mut Storage<'_>, frames: usize) -> Result<Slot> {
        if let Some(slot) = self.memo[index] {
            return Ok(slot);
        }
        let stage = self.chain.stages[index];
        let alloc = self.plan[index];

        let src = if index == 0 {
            View::caller(Slot::Input, &self.chain.input, frames)
        } else {
            let slot = self.pull(index - 1, storage, frames)?;
            View::stage(slot, &self.chain.stages[index - 1], frames)
        };

        let slot = if index == 0
            && alloc.in_place
            && self.chain.in_default
            && storage.input.is_writable()
        {
            // Canonical, writable input: downstream stages read it directly.
            Slot::Input
        } else {
            let dst = if alloc.in_place && (src.slot != Slot::Input || storage.input.is_writable())
            {
                src.slot
            } else {
                match alloc.target {
                    AllocTarget::Output => Slot::Output,
                    AllocTarget::Scratch => {
                        storage
                            .scratch
                            .ensure(index, stage.stride, stage.blocks, frames)?;
                        Slot::Scratch(index)
                    }
                }
            };
            let mut planes = storage.planes(src, View::stage(dst, &stage, frames))?;
            self.apply(
                stage.kind,
                &mut planes,
                stage.blocks,
                frames * stage.inc,
                frames,
            );
            dst
        };

        tracing::trace!(
            "stage {} ({}, {} x {}): {:?} -> {:?}, {} frames",
            index,
            stage.kind,
            stage.channels,
            stage.format,
            src.slot,
            slot,
            frames
        );
        self.memo[index] = Some(slot);
        Ok(slot)
    }

    fn apply(
        &mut self,
        kind: StageKind,
        planes: &mut Planes<'_>,
        blocks: usize,
        elements: usize,
        frames: usize,
    ) {
        let layout = self.chain.layout;
        match kind {
            StageKind::Unpack => {
                let codec = self.chain.input.format.info().codec;
                for block in 0..blocks {
                    codec.unpack(&mut planes.lane(block), elements);
                }
            }
            StageKind::ConvertIn => {
                for block in 0..blocks {
                    convert::s32_to_f64(&mut planes.lane(block), elements);
                }
            }
            StageKind::ChannelMix => self.mix.mix(planes, layout, frames),
            StageKind::ConvertOut => {
                for block in 0..blocks {
                    convert::f64_to_s32(&mut planes.lane(block), elements, self.chain.narrow_step);
                }
            }
            StageKind::Quantize => self.quantizer.quantize(planes, layout, frames),
            StageKind::Pack => {
                let codec = self.chain.output.format.info().codec;
                for block in 0..blocks {
                    codec.pack(&mut planes.lane(block), elements);
                }
            }
        }
    }
}
