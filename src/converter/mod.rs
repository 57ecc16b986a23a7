//! The audio converter.
//!
//! An [`AudioConverter`] is built once for a pair of formats and then run any
//! number of times over caller buffers:
//!
//! ```rust
//! use pcm_convert::prelude::*;
//!
//! let input = AudioFormat::new(SampleFormat::S16Le, 48000, 2);
//! let output = AudioFormat::new(SampleFormat::F32Le, 48000, 2);
//! let mut converter = AudioConverter::new(input, output, ConverterConfig::default()).unwrap();
//!
//! let samples: Vec<u8> = [16384i16, -16384].iter().flat_map(|s| s.to_le_bytes()).collect();
//! let mut out = vec![0u8; 8];
//! let (consumed, produced) = converter.execute(&[&samples], 1, &mut [&mut out], 1).unwrap();
//! assert_eq!((consumed, produced), (1, 1));
//! assert_eq!(f32::from_le_bytes([out[0], out[1], out[2], out[3]]), 0.5);
//! ```
//!
//! # Construction
//!
//! The converter materializes only the stages the conversion needs, in this
//! order:
//!
//! | Stage        | Present when                                              |
//! |--------------|-----------------------------------------------------------|
//! | unpack       | always                                                    |
//! | convert-in   | integer input and float output, or a non-identity mix     |
//! | channel-mix  | the mix matrix is not the identity                        |
//! | convert-out  | float working samples and integer output                  |
//! | quantize     | integer output below 32 bits that loses precision         |
//! | pack         | the working encoding differs from the output encoding     |
//!
//! A backward pass then decides, per stage, whether it writes the caller's
//! output directly or its own scratch buffer, and whether it may overwrite
//! its input.

mod alloc;
mod chain;
mod exec;
mod policy;
mod scratch;

pub use alloc::{AllocTarget, StageAlloc};
pub use chain::StageKind;
pub use policy::resolve_quantize_methods;

use crate::config::{ConverterConfig, DitherMethod, NoiseShapingMethod, PropertyValue};
use crate::error::{Error, Result};
use crate::format::AudioFormat;
use crate::kernels::{ChannelMix, Quantizer};

use chain::Chain;
use exec::{Pipeline, Source, Storage};
use scratch::ScratchArena;

/// Converts audio between two fixed formats.
#[derive(Debug)]
pub struct AudioConverter {
    input: AudioFormat,
    output: AudioFormat,
    config: ConverterConfig,
    pipeline: Pipeline,
    scratch: ScratchArena,
    passthrough: bool,
}

impl AudioConverter {
    /// Build a converter from `input` to `output`.
    ///
    /// # Errors
    ///
    /// Fails when either format is invalid, the sample rates or layouts
    /// differ, or the channel count changes while either side is
    /// unpositioned.
    pub fn new(input: AudioFormat, output: AudioFormat, config: ConverterConfig) -> Result<Self> {
        Self::check_formats(&input, &output).inspect_err(|e| {
            tracing::warn!("cannot convert {:?} to {:?}: {}", input, output, e);
        })?;

        let mix = ChannelMix::new(
            input.positions.as_deref(),
            input.channels as usize,
            output.positions.as_deref(),
            output.channels as usize,
        );
        let chain = Chain::build(&input, &output, &mix);
        let quantizer = build_quantizer(&input, &output, &config);
        let passthrough = input.sample_format == output.sample_format && chain.mix_passthrough;
        if passthrough {
            tracing::info!("passthrough {}", input.sample_format);
        }

        let scratch = ScratchArena::new(chain.stages.len());
        let pipeline = Pipeline::new(chain, mix, quantizer);
        tracing::debug!("allocation plan {:?}", pipeline.plan());

        Ok(Self {
            input,
            output,
            config,
            pipeline,
            scratch,
            passthrough,
        })
    }

    fn check_formats(input: &AudioFormat, output: &AudioFormat) -> Result<()> {
        input.validate()?;
        output.validate()?;
        if input.sample_rate != output.sample_rate {
            return Err(Error::RateMismatch {
                input: input.sample_rate,
                output: output.sample_rate,
            });
        }
        if input.layout != output.layout {
            return Err(Error::LayoutMismatch {
                input: input.layout,
                output: output.layout,
            });
        }
        if input.channels != output.channels
            && (input.is_unpositioned() || output.is_unpositioned())
        {
            return Err(Error::UnpositionedChannels {
                input: input.channels,
                output: output.channels,
            });
        }
        Ok(())
    }

    /// Convert `min(in_frames, out_frames)` frames from read-only input.
    ///
    /// `input` and `output` hold one buffer when interleaved and one per
    /// channel when planar. Returns `(consumed, produced)`, which are equal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Buffer`] before touching any buffer when the block
    /// count or a block's length does not cover the frames converted.
    pub fn execute(
        &mut self,
        input: &[&[u8]],
        in_frames: usize,
        output: &mut [&mut [u8]],
        out_frames: usize,
    ) -> Result<(usize, usize)> {
        let source = Source::Shared(input.iter().copied().collect());
        self.convert(source, in_frames, output, out_frames)
    }

    /// Like [`execute`](Self::execute), but the converter may use `input`
    /// as working memory, leaving its contents unspecified.
    pub fn execute_writable(
        &mut self,
        input: &mut [&mut [u8]],
        in_frames: usize,
        output: &mut [&mut [u8]],
        out_frames: usize,
    ) -> Result<(usize, usize)> {
        let source = Source::Writable(input.iter_mut().map(|b| &mut **b).collect());
        self.convert(source, in_frames, output, out_frames)
    }

    fn convert<'a>(
        &'a mut self,
        input: Source<'a>,
        in_frames: usize,
        output: &'a mut [&mut [u8]],
        out_frames: usize,
    ) -> Result<(usize, usize)> {
        let frames = in_frames.min(out_frames);
        if frames == 0 {
            return Ok((0, 0));
        }

        let in_len = block_len("input", frames, self.input.block_stride())?;
        let out_len = block_len("output", frames, self.output.block_stride())?;
        check_blocks(
            "input",
            self.input.blocks(),
            input.block_count(),
            in_len,
            |b| input.block_len(b),
        )?;
        check_blocks(
            "output",
            self.output.blocks(),
            output.len(),
            out_len,
            |b| output[b].len(),
        )?;

        if self.passthrough {
            for (block, dst) in output.iter_mut().enumerate() {
                let src: &[u8] = match &input {
                    Source::Shared(blocks) => blocks[block],
                    Source::Writable(blocks) => &*blocks[block],
                };
                dst[..out_len].copy_from_slice(&src[..in_len]);
            }
            return Ok((frames, frames));
        }

        let mut storage = Storage {
            input,
            output: output.iter_mut().map(|b| &mut **b).collect(),
            scratch: &mut self.scratch,
        };
        self.pipeline.run(&mut storage, frames)?;
        Ok((frames, frames))
    }

    /// Input frames needed to produce `out_frames` output frames.
    pub fn get_in_frames(&self, out_frames: usize) -> usize {
        out_frames
    }

    /// Output frames produced from `in_frames` input frames.
    pub fn get_out_frames(&self, in_frames: usize) -> usize {
        in_frames
    }

    /// Frames of delay the conversion adds; always zero.
    pub fn get_max_latency(&self) -> usize {
        0
    }

    /// Returns true when output is a byte-for-byte copy of the input.
    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    /// Input format.
    pub fn input_format(&self) -> &AudioFormat {
        &self.input
    }

    /// Output format.
    pub fn output_format(&self) -> &AudioFormat {
        &self.output
    }

    /// Active configuration.
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Active configuration as properties.
    pub fn config_properties(&self) -> Vec<(String, PropertyValue)> {
        self.config.to_properties()
    }

    /// Merge `properties` into the active configuration.
    ///
    /// The stage layout is kept; the quantizer is rebuilt so new dither and
    /// noise shaping methods take effect on the next call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unknown keys or invalid values, leaving
    /// the configuration unchanged.
    pub fn set_config(&mut self, properties: &[(String, PropertyValue)]) -> Result<()> {
        let mut config = self.config;
        config.apply(properties)?;

        self.pipeline
            .set_quantizer(build_quantizer(&self.input, &self.output, &config));
        self.config = config;
        tracing::info!("configuration updated: {}", config);
        Ok(())
    }

    /// Stage kinds in execution order, including an implicit pack.
    pub fn stages(&self) -> Vec<StageKind> {
        self.pipeline.chain().kinds()
    }

    /// Allocation decision for each materialized stage (pack excluded).
    pub fn allocation(&self) -> &[StageAlloc] {
        self.pipeline.plan()
    }

    /// Channel-mix matrix in use.
    pub fn channel_mix(&self) -> &ChannelMix {
        self.pipeline.mix()
    }

    /// Dither and noise shaping methods in effect after policy resolution.
    pub fn quantize_methods(&self) -> (DitherMethod, NoiseShapingMethod) {
        let quantizer = self.pipeline.quantizer();
        (quantizer.dither(), quantizer.noise_shaping())
    }
}

fn build_quantizer(
    input: &AudioFormat,
    output: &AudioFormat,
    config: &ConverterConfig,
) -> Quantizer {
    let in_info = input.info();
    let out_info = output.info();
    let (dither, noise_shaping) = resolve_quantize_methods(
        out_info.depth,
        in_info.depth,
        in_info.unpack_format.is_integer(),
        output.sample_rate,
        config.dither,
        config.noise_shaping,
    );
    tracing::info!(
        "quantizer: depth {}, dither {}, noise shaping {}, granularity {}",
        out_info.depth,
        dither,
        noise_shaping,
        config.quantization
    );
    Quantizer::new(
        dither,
        noise_shaping,
        output.channels as usize,
        out_info.depth,
        config.quantization,
    )
}

/// Bytes `frames` frames occupy in each block of one side.
fn block_len(side: &str, frames: usize, stride: usize) -> Result<usize> {
    frames
        .checked_mul(stride)
        .ok_or_else(|| Error::Buffer(format!("{side}: {frames} frames overflow a block")))
}

fn check_blocks(
    side: &str,
    expected: usize,
    actual: usize,
    len: usize,
    block_len: impl Fn(usize) -> usize,
) -> Result<()> {
    if actual != expected {
        return Err(Error::Buffer(format!(
            "{side}: expected {expected} blocks, got {actual}"
        )));
    }
    if let Some(block) = (0..actual).find(|&b| block_len(b) < len) {
        return Err(Error::Buffer(format!(
            "{side} block {block} holds {} bytes, need {len}",
            block_len(block)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{AudioLayout, ChannelPosition, SampleFormat};

    fn s16(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn from_s16(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect()
    }

    #[test]
    fn test_rejects_rate_mismatch() {
        let err = AudioConverter::new(
            AudioFormat::new(SampleFormat::S16Le, 44100, 2),
            AudioFormat::new(SampleFormat::S16Le, 48000, 2),
            ConverterConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::RateMismatch {
                input: 44100,
                output: 48000
            }
        );
    }

    #[test]
    fn test_rejects_invalid_format() {
        let bad = AudioFormat::new(SampleFormat::S16Le, 48000, 2)
            .with_positions(vec![ChannelPosition::FrontLeft, ChannelPosition::FrontLeft]);
        let result = AudioConverter::new(
            bad,
            AudioFormat::new(SampleFormat::S16Le, 48000, 2),
            ConverterConfig::default(),
        );
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_passthrough_detection() {
        let format = AudioFormat::new(SampleFormat::S24Le, 48000, 6);
        let converter =
            AudioConverter::new(format.clone(), format, ConverterConfig::default()).unwrap();
        assert!(converter.is_passthrough());
        assert_eq!(converter.get_max_latency(), 0);
        assert_eq!(converter.get_in_frames(480), 480);
        assert_eq!(converter.get_out_frames(480), 480);
    }

    #[test]
    fn test_stereo_to_mono_averages() {
        let mut converter = AudioConverter::new(
            AudioFormat::new(SampleFormat::S16Le, 48000, 2),
            AudioFormat::new(SampleFormat::S16Le, 48000, 1),
            ConverterConfig::default(),
        )
        .unwrap();
        let input = s16(&[1000, 3000, -200, -400, 32767, 32767]);
        let mut output = vec![0u8; 6];
        let done = converter
            .execute(&[&input], 3, &mut [&mut output], 3)
            .unwrap();
        assert_eq!(done, (3, 3));
        assert_eq!(from_s16(&output), vec![2000, -300, 32767]);
    }

    #[test]
    fn test_writable_input_is_used_in_place() {
        let format = AudioFormat::new(SampleFormat::F64, 48000, 2);
        let mono = AudioFormat::new(SampleFormat::F64, 48000, 1);
        let mut converter = AudioConverter::new(format, mono, ConverterConfig::default()).unwrap();
        assert_eq!(
            converter.allocation()[0],
            StageAlloc {
                target: AllocTarget::Scratch,
                in_place: true
            }
        );

        let mut input: Vec<u8> = [0.5f64, 0.25].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let mut output = vec![0u8; 8];
        converter
            .execute_writable(&mut [&mut input], 1, &mut [&mut output], 1)
            .unwrap();
        assert_eq!(f64::from_ne_bytes(output[..8].try_into().unwrap()), 0.375);
        assert_eq!(converter.scratch.capacity(0), 0, "unpack reused the input");
    }

    #[test]
    fn test_planar_unpositioned_same_count() {
        let input = AudioFormat::new(SampleFormat::S16Le, 8000, 10)
            .with_layout(AudioLayout::NonInterleaved);
        let output = AudioFormat::new(SampleFormat::S32Be, 8000, 10)
            .with_layout(AudioLayout::NonInterleaved);
        assert!(input.is_unpositioned());

        let mut converter = AudioConverter::new(input, output, ConverterConfig::default()).unwrap();
        let planes: Vec<Vec<u8>> = (0..10).map(|c| s16(&[c as i16, -(c as i16)])).collect();
        let mut out: Vec<Vec<u8>> = vec![vec![0u8; 8]; 10];
        let src: Vec<&[u8]> = planes.iter().map(|p| p.as_slice()).collect();
        let mut dst: Vec<&mut [u8]> = out.iter_mut().map(|p| p.as_mut_slice()).collect();
        converter.execute(&src, 2, &mut dst, 2).unwrap();

        let expected: Vec<u8> = [3i32 << 16, -3 << 16]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect();
        assert_eq!(out[3], expected);
    }

    #[test]
    fn test_set_config_keeps_layout() {
        let mut converter = AudioConverter::new(
            AudioFormat::new(SampleFormat::F32Le, 44100, 2),
            AudioFormat::new(SampleFormat::S16Le, 44100, 2),
            ConverterConfig::default(),
        )
        .unwrap();
        let stages = converter.stages();

        let props = crate::config::parse_properties("dither-method=tpdf noise-shaping-method=simple")
            .unwrap();
        converter.set_config(&props).unwrap();
        assert_eq!(converter.stages(), stages);
        assert_eq!(
            converter.quantize_methods(),
            (DitherMethod::Tpdf, NoiseShapingMethod::Simple)
        );

        let bad = vec![("dither-method".to_string(), PropertyValue::from("loud"))];
        assert!(matches!(converter.set_config(&bad), Err(Error::Config(_))));
        assert_eq!(converter.config().dither, DitherMethod::Tpdf);
    }
}
