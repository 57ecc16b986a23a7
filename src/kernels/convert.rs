//! Bulk conversion between the two canonical working encodings.

use super::Lane;
use super::quantize::step_bounds;

const SCALE: f64 = 2147483648.0;

/// Convert `elements` native S32 samples to F64 in [-1.0, 1.0).
pub(crate) fn s32_to_f64(lane: &mut Lane<'_>, elements: usize) {
    for i in 0..elements {
        let value = lane.read_i32(i * 4) as f64 / SCALE;
        lane.write(i * 8, &value.to_ne_bytes());
    }
}

/// Convert `elements` F64 samples to native S32, rounding to the nearest
/// multiple of `step` and saturating.
///
/// Safe in place: each S32 written is narrower than the F64 it replaces.
pub(crate) fn f64_to_s32(lane: &mut Lane<'_>, elements: usize, step: i64) {
    let (min, max) = step_bounds(step);
    let step = step as f64;
    for i in 0..elements {
        let scaled = lane.read_f64(i * 8) * SCALE;
        let rounded = if step > 1.0 {
            (scaled / step).round() * step
        } else {
            scaled.round()
        };
        let value = rounded.clamp(min as f64, max as f64) as i32;
        lane.write(i * 4, &value.to_ne_bytes());
    }
}
