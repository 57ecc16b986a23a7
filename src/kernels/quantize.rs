//! Bit-depth reduction with dither and noise shaping.
//!
//! The quantizer rounds native S32 samples to multiples of a step
//! (`granularity << (32 - depth)`), optionally adding dither noise before
//! rounding and feeding the rounding error of previous samples back into
//! the next one. The error history and the dither generator state persist
//! across calls.

use crate::config::{DitherMethod, NoiseShapingMethod};
use crate::format::AudioLayout;

use super::Planes;

/// Error-feedback filter taps, most recent error first.
const ERROR_FEEDBACK_COEFFS: &[f64] = &[1.0];
const SIMPLE_COEFFS: &[f64] = &[1.0, -0.5];
const MEDIUM_COEFFS: &[f64] = &[1.033, -2.165, 1.959, -1.590, 0.6149];
const HIGH_COEFFS: &[f64] = &[
    2.33282, -2.51273, 2.06896, -1.34765, 1.18075, -1.1563, 0.876066, -0.340122,
];

const DITHER_SEED: u64 = 0x2545_F491_4F6C_DD1D;

/// Smallest and largest multiples of `step` representable as i32.
pub(crate) fn step_bounds(step: i64) -> (i64, i64) {
    let max = (i32::MAX as i64).div_euclid(step) * step;
    let min = -((1i64 << 31).div_euclid(step) * step);
    (min, max)
}

/// xorshift64* generator.
#[derive(Debug, Clone)]
struct XorShift64(u64);

impl XorShift64 {
    fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        (x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 32) as u32
    }

    /// Uniform value in [-0.5, 0.5).
    fn next_centered(&mut self) -> f64 {
        self.next_u32() as f64 / 4294967296.0 - 0.5
    }
}

/// Stateful bit-depth reducer.
#[derive(Debug, Clone)]
pub struct Quantizer {
    dither: DitherMethod,
    noise_shaping: NoiseShapingMethod,
    channels: usize,
    step: i64,
    min: i64,
    max: i64,
    coeffs: &'static [f64],
    /// Per-channel error history, `coeffs.len()` entries each, most recent first.
    errors: Vec<f64>,
    /// Per-channel previous random value for high-passed TPDF.
    last_random: Vec<f64>,
    rng: XorShift64,
}

impl Quantizer {
    /// Create a quantizer rounding to `depth` significant bits, coarsened by
    /// `granularity`.
    pub fn new(
        dither: DitherMethod,
        noise_shaping: NoiseShapingMethod,
        channels: usize,
        depth: u32,
        granularity: u32,
    ) -> Self {
        let step = (granularity.max(1) as i64) << (32 - depth.clamp(1, 32));
        let (min, max) = step_bounds(step);
        let coeffs: &'static [f64] = match noise_shaping {
            NoiseShapingMethod::None => &[],
            NoiseShapingMethod::ErrorFeedback => ERROR_FEEDBACK_COEFFS,
            NoiseShapingMethod::Simple => SIMPLE_COEFFS,
            NoiseShapingMethod::Medium => MEDIUM_COEFFS,
            NoiseShapingMethod::High => HIGH_COEFFS,
        };

        Self {
            dither,
            noise_shaping,
            channels,
            step,
            min,
            max,
            coeffs,
            errors: vec![0.0; channels * coeffs.len()],
            last_random: vec![0.0; channels],
            rng: XorShift64(DITHER_SEED),
        }
    }

    /// Dither method in effect.
    pub fn dither(&self) -> DitherMethod {
        self.dither
    }

    /// Noise shaping method in effect.
    pub fn noise_shaping(&self) -> NoiseShapingMethod {
        self.noise_shaping
    }

    /// Quantization step in S32 units.
    pub fn step(&self) -> i64 {
        self.step
    }

    /// Clear error history and restart the dither sequence.
    pub fn reset(&mut self) {
        self.errors.fill(0.0);
        self.last_random.fill(0.0);
        self.rng = XorShift64(DITHER_SEED);
    }

    /// Quantize `frames` frames of native S32 samples.
    pub(crate) fn quantize(&mut self, planes: &mut Planes<'_>, layout: AudioLayout, frames: usize) {
        let plain =
            self.dither == DitherMethod::None && self.noise_shaping == NoiseShapingMethod::None;

        for n in 0..frames {
            for c in 0..self.channels {
                let (block, offset) = match layout {
                    AudioLayout::Interleaved => (0, (n * self.channels + c) * 4),
                    AudioLayout::NonInterleaved => (c, n * 4),
                };
                let sample = planes.read_i32(block, offset) as i64;
                let value = if plain {
                    self.round(sample)
                } else {
                    self.shape(c, sample)
                };
                planes.write(block, offset, &value.to_ne_bytes());
            }
        }
    }

    fn round(&self, sample: i64) -> i32 {
        let q = (sample + self.step / 2).div_euclid(self.step) * self.step;
        q.clamp(self.min, self.max) as i32
    }

    fn shape(&mut self, channel: usize, sample: i64) -> i32 {
        let step = self.step as f64;
        let taps = self.coeffs.len();
        let history = &mut self.errors[channel * taps..(channel + 1) * taps];

        let feedback: f64 = self.coeffs.iter().zip(history.iter()).map(|(c, e)| c * e).sum();
        let shaped = sample as f64 - feedback;

        let noise = match self.dither {
            DitherMethod::None => 0.0,
            DitherMethod::Rpdf => self.rng.next_centered() * step,
            DitherMethod::Tpdf => (self.rng.next_centered() + self.rng.next_centered()) * step,
            DitherMethod::TpdfHf => {
                let r = self.rng.next_centered() * step;
                let d = r - self.last_random[channel];
                self.last_random[channel] = r;
                d
            }
        };

        let q = ((shaped + noise) / step + 0.5).floor() * step;
        let q = q.clamp(self.min as f64, self.max as f64);

        if taps > 0 {
            history.rotate_right(1);
            history[0] = q - shaped;
        }
        q as i32
    }
}
