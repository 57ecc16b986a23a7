//! Stage chain construction.
//!
//! The builder walks the six logical steps in order and materializes only
//! those the two formats require. Each stage records the working encoding
//! and geometry it produces, plus the two flags the allocator pass reads.

use std::fmt;

use crate::format::{AudioFormat, AudioLayout, SampleFormat};
use crate::kernels::ChannelMix;

/// One step of the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Wire encoding to canonical S32 or F64.
    Unpack,
    /// S32 to F64.
    ConvertIn,
    /// Channel-mix matrix.
    ChannelMix,
    /// F64 to S32.
    ConvertOut,
    /// Bit-depth reduction with dither and noise shaping.
    Quantize,
    /// Canonical encoding to the output wire encoding.
    Pack,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Unpack => "unpack",
            StageKind::ConvertIn => "convert-in",
            StageKind::ChannelMix => "channel-mix",
            StageKind::ConvertOut => "convert-out",
            StageKind::Quantize => "quantize",
            StageKind::Pack => "pack",
        };
        f.write_str(name)
    }
}

/// A materialized stage and the shape of the samples it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stage {
    pub(crate) kind: StageKind,
    /// Working encoding after this stage.
    pub(crate) format: SampleFormat,
    pub(crate) channels: usize,
    /// Bytes per frame within one block.
    pub(crate) stride: usize,
    /// Elements per frame within one block.
    pub(crate) inc: usize,
    pub(crate) blocks: usize,
    /// The stage may overwrite its input.
    pub(crate) allow_in_place: bool,
    /// The stage may hand its own allocation target to its predecessor.
    pub(crate) pass_alloc: bool,
}

impl Stage {
    fn new(
        kind: StageKind,
        format: SampleFormat,
        channels: usize,
        layout: AudioLayout,
        allow_in_place: bool,
        pass_alloc: bool,
    ) -> Self {
        let (inc, blocks) = match layout {
            AudioLayout::Interleaved => (channels, 1),
            AudioLayout::NonInterleaved => (1, channels),
        };
        Self {
            kind,
            format,
            channels,
            stride: format.bytes() * inc,
            inc,
            blocks,
            allow_in_place,
            pass_alloc,
        }
    }
}

/// Block count and per-frame block stride of a caller-side buffer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
    pub(crate) format: SampleFormat,
    pub(crate) blocks: usize,
    pub(crate) stride: usize,
    pub(crate) inc: usize,
}

impl Geometry {
    fn of(format: &AudioFormat) -> Self {
        let blocks = format.blocks();
        Self {
            format: format.sample_format,
            blocks,
            stride: format.block_stride(),
            inc: format.channels as usize / blocks,
        }
    }

    /// Bytes `frames` frames occupy in each block.
    pub(crate) fn len(&self, frames: usize) -> usize {
        frames * self.stride
    }
}

/// Built stage list and the facts derived while building it.
#[derive(Debug, Clone)]
pub(crate) struct Chain {
    pub(crate) stages: Vec<Stage>,
    pub(crate) layout: AudioLayout,
    pub(crate) input: Geometry,
    pub(crate) output: Geometry,
    /// The input wire encoding is already canonical.
    pub(crate) in_default: bool,
    /// The last stage produces the output wire encoding.
    pub(crate) out_default: bool,
    pub(crate) mix_passthrough: bool,
    /// Rounding step of the F64 to S32 stage.
    pub(crate) narrow_step: i64,
}

impl Chain {
    /// Build the stage list converting `input` into `output` through `mix`.
    ///
    /// Both formats must already be validated and compatible.
    pub(crate) fn build(input: &AudioFormat, output: &AudioFormat, mix: &ChannelMix) -> Self {
        let layout = input.layout;
        let in_info = input.info();
        let out_info = output.info();
        let in_channels = input.channels as usize;
        let out_channels = output.channels as usize;
        let mut stages = Vec::with_capacity(5);

        // unpack
        let mut format = in_info.unpack_format;
        let in_default = input.sample_format == format;
        stages.push(Stage::new(
            StageKind::Unpack,
            format,
            in_channels,
            layout,
            format.bytes() <= input.sample_format.bytes(),
            false,
        ));
        tracing::info!("unpack {} to {}", input.sample_format, format);

        let in_int = format.is_integer();
        let out_int = out_info.unpack_format.is_integer();
        let mix_passthrough = mix.is_passthrough();

        // convert-in
        if in_int && (!out_int || !mix_passthrough) {
            format = SampleFormat::F64;
            stages.push(Stage::new(
                StageKind::ConvertIn,
                format,
                in_channels,
                layout,
                false,
                false,
            ));
            tracing::info!("convert S32 to F64");
        }

        // channel-mix
        if mix_passthrough {
            tracing::info!("channel mix passthrough");
        } else {
            stages.push(Stage::new(
                StageKind::ChannelMix,
                format,
                out_channels,
                layout,
                in_channels >= out_channels,
                in_channels <= out_channels,
            ));
            tracing::info!("channel mix {} to {} channels", in_channels, out_channels);
        }

        // convert-out
        let mut narrow = false;
        if format.is_float() && out_int {
            format = SampleFormat::S32;
            stages.push(Stage::new(
                StageKind::ConvertOut,
                format,
                out_channels,
                layout,
                true,
                false,
            ));
            narrow = true;
            tracing::info!("convert F64 to S32");
        }

        // quantize
        let quantize_depth = (out_int
            && out_info.depth < 32
            && !(in_int && out_info.depth >= in_info.depth))
            .then_some(out_info.depth);
        if let Some(depth) = quantize_depth {
            stages.push(Stage::new(
                StageKind::Quantize,
                format,
                out_channels,
                layout,
                true,
                true,
            ));
            tracing::info!("quantize to {} bits", depth);
        }

        let narrow_step = if narrow && quantize_depth.is_none() && out_info.depth < 32 {
            1i64 << (32 - out_info.depth)
        } else {
            1
        };

        // pack
        let out_default = output.sample_format == format;
        if out_default {
            tracing::info!("no pack needed, {} is the working format", format);
        } else {
            tracing::info!("pack {} to {}", format, output.sample_format);
        }

        Self {
            stages,
            layout,
            input: Geometry::of(input),
            output: Geometry::of(output),
            in_default,
            out_default,
            mix_passthrough,
            narrow_step,
        }
    }

    /// Stage kinds in execution order, including the implicit pack.
    pub(crate) fn kinds(&self) -> Vec<StageKind> {
        let mut kinds: Vec<_> = self.stages.iter().map(|s| s.kind).collect();
        if !self.out_default {
            kinds.push(StageKind::Pack);
        }
        kinds
    }

    /// The last materialized stage.
    pub(crate) fn last(&self) -> &Stage {
        // Unpack is always present.
        &self.stages[self.stages.len() - 1]
    }
}
