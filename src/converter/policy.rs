//! Dither and noise-shaping selection.

use crate::config::{DitherMethod, NoiseShapingMethod};

/// Output depths above this gain nothing audible from dither or shaping.
const MAX_SHAPED_DEPTH: u32 = 20;

/// Shaping filters beyond error feedback need at least this sample rate.
const MIN_SHAPING_RATE: u32 = 32000;

/// Pick the quantization methods actually used for a conversion.
///
/// Deep outputs and lossless integer conversions get neither dither nor
/// noise shaping. Below 32 kHz noise shaping is capped at error feedback.
pub fn resolve_quantize_methods(
    out_depth: u32,
    in_depth: u32,
    in_is_integer: bool,
    out_rate: u32,
    dither: DitherMethod,
    noise_shaping: NoiseShapingMethod,
) -> (DitherMethod, NoiseShapingMethod) {
    if out_depth > MAX_SHAPED_DEPTH || (in_is_integer && out_depth >= in_depth) {
        return (DitherMethod::None, NoiseShapingMethod::None);
    }

    let noise_shaping =
        if noise_shaping > NoiseShapingMethod::ErrorFeedback && out_rate < MIN_SHAPING_RATE {
            NoiseShapingMethod::ErrorFeedback
        } else {
            noise_shaping
        };
    (dither, noise_shaping)
}
