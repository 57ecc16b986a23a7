//! Audio format descriptors.
//!
//! This module describes one side of a conversion:
//!
//! - [`SampleFormat`]: wire encoding of a single sample
//! - [`FormatInfo`]: static properties of an encoding (domain, width, depth, canonical form)
//! - [`AudioLayout`]: interleaved or planar frames
//! - [`ChannelPosition`]: spatial role of a channel
//! - [`AudioFormat`]: the complete descriptor handed to the converter

use std::fmt;

use crate::error::{Error, Result};
use crate::kernels::pack::{FloatCodec, IntCodec, SampleCodec};

use Endianness::{Big, Little};
use SampleKind::{Signed, Unsigned};

// ============================================================================
// Sample Formats
// ============================================================================

/// Audio sample wire encodings.
///
/// Integer encodings unpack to native-endian [`SampleFormat::S32`], float
/// encodings to native-endian [`SampleFormat::F64`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum SampleFormat {
    /// Signed 8-bit.
    S8 = 0,
    /// Unsigned 8-bit (silence at 128).
    U8,
    /// Signed 16-bit little-endian.
    S16Le,
    /// Signed 16-bit big-endian.
    S16Be,
    /// Unsigned 16-bit little-endian.
    U16Le,
    /// Unsigned 16-bit big-endian.
    U16Be,
    /// Signed 24-bit in the low bits of a 32-bit little-endian container.
    S24In32Le,
    /// Signed 24-bit in the low bits of a 32-bit big-endian container.
    S24In32Be,
    /// Unsigned 24-bit in the low bits of a 32-bit little-endian container.
    U24In32Le,
    /// Unsigned 24-bit in the low bits of a 32-bit big-endian container.
    U24In32Be,
    /// Signed 32-bit little-endian.
    S32Le,
    /// Signed 32-bit big-endian.
    S32Be,
    /// Unsigned 32-bit little-endian.
    U32Le,
    /// Unsigned 32-bit big-endian.
    U32Be,
    /// Signed packed 24-bit little-endian (3 bytes).
    S24Le,
    /// Signed packed 24-bit big-endian (3 bytes).
    S24Be,
    /// Unsigned packed 24-bit little-endian (3 bytes).
    U24Le,
    /// Unsigned packed 24-bit big-endian (3 bytes).
    U24Be,
    /// 32-bit float little-endian.
    F32Le,
    /// 32-bit float big-endian.
    F32Be,
    /// 64-bit float little-endian.
    F64Le,
    /// 64-bit float big-endian.
    F64Be,
}

impl SampleFormat {
    /// Native-endian signed 32-bit, the canonical integer working encoding.
    pub const S32: Self = if cfg!(target_endian = "big") {
        Self::S32Be
    } else {
        Self::S32Le
    };

    /// Native-endian 64-bit float, the canonical float working encoding.
    pub const F64: Self = if cfg!(target_endian = "big") {
        Self::F64Be
    } else {
        Self::F64Le
    };

    /// Native-endian signed 16-bit.
    pub const S16: Self = if cfg!(target_endian = "big") {
        Self::S16Be
    } else {
        Self::S16Le
    };

    /// Native-endian 32-bit float.
    pub const F32: Self = if cfg!(target_endian = "big") {
        Self::F32Be
    } else {
        Self::F32Le
    };

    /// All supported encodings, in table order.
    pub const ALL: [SampleFormat; 22] = [
        Self::S8,
        Self::U8,
        Self::S16Le,
        Self::S16Be,
        Self::U16Le,
        Self::U16Be,
        Self::S24In32Le,
        Self::S24In32Be,
        Self::U24In32Le,
        Self::U24In32Be,
        Self::S32Le,
        Self::S32Be,
        Self::U32Le,
        Self::U32Be,
        Self::S24Le,
        Self::S24Be,
        Self::U24Le,
        Self::U24Be,
        Self::F32Le,
        Self::F32Be,
        Self::F64Le,
        Self::F64Be,
    ];

    /// Static description of this encoding.
    pub fn info(self) -> &'static FormatInfo {
        &FORMATS[self as usize]
    }

    /// Bytes occupied by one sample.
    pub fn bytes(self) -> usize {
        self.info().width as usize / 8
    }

    /// Returns true for floating point encodings.
    pub fn is_float(self) -> bool {
        self.info().kind == SampleKind::Float
    }

    /// Returns true for integer encodings.
    pub fn is_integer(self) -> bool {
        !self.is_float()
    }

    /// Canonical working encoding this format unpacks to.
    pub fn unpack_format(self) -> SampleFormat {
        self.info().unpack_format
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().name)
    }
}

/// Numeric domain of an encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleKind {
    /// Two's complement integer.
    Signed,
    /// Offset-binary integer.
    Unsigned,
    /// IEEE 754 float.
    Float,
}

/// Byte order of an encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endianness {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

/// Static properties of a [`SampleFormat`].
pub struct FormatInfo {
    /// The encoding described.
    pub format: SampleFormat,
    /// Short name, e.g. `S16LE`.
    pub name: &'static str,
    /// Numeric domain.
    pub kind: SampleKind,
    /// Container width in bits.
    pub width: u32,
    /// Significant bits.
    pub depth: u32,
    /// Byte order.
    pub endianness: Endianness,
    /// Canonical working encoding.
    pub unpack_format: SampleFormat,
    pub(crate) codec: &'static dyn SampleCodec,
}

impl fmt::Debug for FormatInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatInfo")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("width", &self.width)
            .field("depth", &self.depth)
            .field("endianness", &self.endianness)
            .field("unpack_format", &self.unpack_format)
            .finish()
    }
}

const fn int(
    format: SampleFormat,
    name: &'static str,
    kind: SampleKind,
    width: u32,
    depth: u32,
    endianness: Endianness,
    codec: &'static IntCodec,
) -> FormatInfo {
    FormatInfo {
        format,
        name,
        kind,
        width,
        depth,
        endianness,
        unpack_format: SampleFormat::S32,
        codec,
    }
}

const fn float(
    format: SampleFormat,
    name: &'static str,
    width: u32,
    endianness: Endianness,
    codec: &'static FloatCodec,
) -> FormatInfo {
    FormatInfo {
        format,
        name,
        kind: SampleKind::Float,
        width,
        depth: width,
        endianness,
        unpack_format: SampleFormat::F64,
        codec,
    }
}

macro_rules! int_codec {
    ($bytes:expr, $depth:expr, $signed:expr, $big_endian:expr) => {
        &IntCodec {
            bytes: $bytes,
            depth: $depth,
            signed: $signed,
            big_endian: $big_endian,
        }
    };
}

macro_rules! float_codec {
    ($bytes:expr, $big_endian:expr) => {
        &FloatCodec {
            bytes: $bytes,
            big_endian: $big_endian,
        }
    };
}

#[rustfmt::skip]
static FORMATS: [FormatInfo; 22] = [
    int(SampleFormat::S8, "S8", Signed, 8, 8, Little, int_codec!(1, 8, true, false)),
    int(SampleFormat::U8, "U8", Unsigned, 8, 8, Little, int_codec!(1, 8, false, false)),
    int(SampleFormat::S16Le, "S16LE", Signed, 16, 16, Little, int_codec!(2, 16, true, false)),
    int(SampleFormat::S16Be, "S16BE", Signed, 16, 16, Big, int_codec!(2, 16, true, true)),
    int(SampleFormat::U16Le, "U16LE", Unsigned, 16, 16, Little, int_codec!(2, 16, false, false)),
    int(SampleFormat::U16Be, "U16BE", Unsigned, 16, 16, Big, int_codec!(2, 16, false, true)),
    int(SampleFormat::S24In32Le, "S24_32LE", Signed, 32, 24, Little, int_codec!(4, 24, true, false)),
    int(SampleFormat::S24In32Be, "S24_32BE", Signed, 32, 24, Big, int_codec!(4, 24, true, true)),
    int(SampleFormat::U24In32Le, "U24_32LE", Unsigned, 32, 24, Little, int_codec!(4, 24, false, false)),
    int(SampleFormat::U24In32Be, "U24_32BE", Unsigned, 32, 24, Big, int_codec!(4, 24, false, true)),
    int(SampleFormat::S32Le, "S32LE", Signed, 32, 32, Little, int_codec!(4, 32, true, false)),
    int(SampleFormat::S32Be, "S32BE", Signed, 32, 32, Big, int_codec!(4, 32, true, true)),
    int(SampleFormat::U32Le, "U32LE", Unsigned, 32, 32, Little, int_codec!(4, 32, false, false)),
    int(SampleFormat::U32Be, "U32BE", Unsigned, 32, 32, Big, int_codec!(4, 32, false, true)),
    int(SampleFormat::S24Le, "S24LE", Signed, 24, 24, Little, int_codec!(3, 24, true, false)),
    int(SampleFormat::S24Be, "S24BE", Signed, 24, 24, Big, int_codec!(3, 24, true, true)),
    int(SampleFormat::U24Le, "U24LE", Unsigned, 24, 24, Little, int_codec!(3, 24, false, false)),
    int(SampleFormat::U24Be, "U24BE", Unsigned, 24, 24, Big, int_codec!(3, 24, false, true)),
    float(SampleFormat::F32Le, "F32LE", 32, Little, float_codec!(4, false)),
    float(SampleFormat::F32Be, "F32BE", 32, Big, float_codec!(4, true)),
    float(SampleFormat::F64Le, "F64LE", 64, Little, float_codec!(8, false)),
    float(SampleFormat::F64Be, "F64BE", 64, Big, float_codec!(8, true)),
];

// ============================================================================
// Layout and Channel Positions
// ============================================================================

/// Arrangement of samples within a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AudioLayout {
    /// All channels of a frame stored together in a single buffer.
    #[default]
    Interleaved,
    /// One buffer per channel (planar).
    NonInterleaved,
}

/// Spatial role of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelPosition {
    /// Single channel carrying the whole sound field.
    Mono,
    /// Front left.
    FrontLeft,
    /// Front right.
    FrontRight,
    /// Front center.
    FrontCenter,
    /// Low-frequency effects.
    Lfe1,
    /// Rear left.
    RearLeft,
    /// Rear right.
    RearRight,
    /// Front left of center.
    FrontLeftOfCenter,
    /// Front right of center.
    FrontRightOfCenter,
    /// Rear center.
    RearCenter,
    /// Second low-frequency effects channel.
    Lfe2,
    /// Side left.
    SideLeft,
    /// Side right.
    SideRight,
}

impl ChannelPosition {
    /// Conventional positions for `channels` channels, or `None` when there is
    /// no conventional layout (more than 8 channels).
    pub fn default_for(channels: u16) -> Option<Vec<ChannelPosition>> {
        use ChannelPosition::*;

        let positions: &[ChannelPosition] = match channels {
            1 => &[Mono],
            2 => &[FrontLeft, FrontRight],
            3 => &[FrontLeft, FrontRight, Lfe1],
            4 => &[FrontLeft, FrontRight, RearLeft, RearRight],
            5 => &[FrontLeft, FrontRight, FrontCenter, RearLeft, RearRight],
            6 => &[FrontLeft, FrontRight, FrontCenter, Lfe1, RearLeft, RearRight],
            7 => &[FrontLeft, FrontRight, FrontCenter, Lfe1, RearCenter, SideLeft, SideRight],
            8 => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                Lfe1,
                RearLeft,
                RearRight,
                SideLeft,
                SideRight,
            ],
            _ => return None,
        };
        Some(positions.to_vec())
    }
}

// ============================================================================
// Audio Format
// ============================================================================

/// Complete description of one side of a conversion.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    /// Sample rate in Hz (e.g., 44100, 48000).
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u16,
    /// Wire encoding of each sample.
    pub sample_format: SampleFormat,
    /// Interleaved or planar frames.
    pub layout: AudioLayout,
    /// Per-channel roles; `None` marks the channels as unpositioned.
    pub positions: Option<Vec<ChannelPosition>>,
}

impl AudioFormat {
    /// Create an interleaved format with the conventional positions for
    /// `channels` (unpositioned above 8 channels).
    pub fn new(sample_format: SampleFormat, sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
            layout: AudioLayout::Interleaved,
            positions: ChannelPosition::default_for(channels),
        }
    }

    /// Set the frame layout.
    pub fn with_layout(mut self, layout: AudioLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Set explicit channel positions.
    pub fn with_positions(mut self, positions: Vec<ChannelPosition>) -> Self {
        self.positions = Some(positions);
        self
    }

    /// Drop channel positions, marking the channels as unpositioned.
    pub fn unpositioned(mut self) -> Self {
        self.positions = None;
        self
    }

    /// Returns true when no channel positions are declared.
    pub fn is_unpositioned(&self) -> bool {
        self.positions.is_none()
    }

    /// Static description of the sample encoding.
    pub fn info(&self) -> &'static FormatInfo {
        self.sample_format.info()
    }

    /// Get bytes per sample (for one channel).
    pub fn bytes_per_sample(&self) -> usize {
        self.sample_format.bytes()
    }

    /// Get bytes per frame (all channels for one sample time).
    pub fn bytes_per_frame(&self) -> usize {
        self.sample_format.bytes() * self.channels as usize
    }

    /// Number of buffers a caller passes for this format.
    pub fn blocks(&self) -> usize {
        match self.layout {
            AudioLayout::Interleaved => 1,
            AudioLayout::NonInterleaved => self.channels as usize,
        }
    }

    /// Bytes one frame occupies within each block.
    pub fn block_stride(&self) -> usize {
        self.bytes_per_frame() / self.blocks()
    }

    /// Check the descriptor for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidFormat("sample rate must be non-zero".into()));
        }
        if self.channels == 0 {
            return Err(Error::InvalidFormat("channels must be non-zero".into()));
        }
        if let Some(positions) = &self.positions {
            if positions.len() != self.channels as usize {
                return Err(Error::InvalidFormat(format!(
                    "{} positions given for {} channels",
                    positions.len(),
                    self.channels
                )));
            }
            for (i, position) in positions.iter().enumerate() {
                if positions[..i].contains(position) {
                    return Err(Error::InvalidFormat(format!(
                        "channel position {position:?} used twice"
                    )));
                }
            }
            if positions.len() > 1 && positions.contains(&ChannelPosition::Mono) {
                return Err(Error::InvalidFormat(
                    "mono position only valid for a single channel".into(),
                ));
            }
        }
        Ok(())
    }
}
