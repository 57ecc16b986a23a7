//! # pcm-convert
//!
//! PCM audio sample-format conversion.
//!
//! An [`AudioConverter`] is built once for a source and destination
//! [`AudioFormat`] and then converts any number of buffers between them:
//! sample encoding, bit depth, and channel layout, with optional dither and
//! noise shaping when the bit depth drops.
//!
//! ## Features
//!
//! - **Minimal stage chains**: only the steps a conversion needs are built
//! - **Few copies**: stages write straight into the caller's output or
//!   overwrite their input wherever the data allows
//! - **Bounded memory**: scratch buffers grow to the largest call and are reused
//! - **Interleaved and planar** frames, 22 integer and float encodings
//!
//! ## Quick Start
//!
//! ```rust
//! use pcm_convert::prelude::*;
//!
//! let input = AudioFormat::new(SampleFormat::F32Le, 48000, 2);
//! let output = AudioFormat::new(SampleFormat::S16Le, 48000, 2);
//! let config: ConverterConfig = "dither-method=tpdf noise-shaping-method=high".parse()?;
//! let mut converter = AudioConverter::new(input, output, config)?;
//!
//! let samples = vec![0u8; 480 * 8];
//! let mut out = vec![0u8; 480 * 4];
//! converter.execute(&[&samples], 480, &mut [&mut out], 480)?;
//! # Ok::<(), pcm_convert::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod converter;
pub mod error;
pub mod format;
pub mod kernels;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{ConverterConfig, DitherMethod, NoiseShapingMethod};
    pub use crate::converter::{AudioConverter, StageKind};
    pub use crate::error::{Error, Result};
    pub use crate::format::{AudioFormat, AudioLayout, ChannelPosition, SampleFormat};
}

pub use converter::AudioConverter;
pub use error::{Error, Result};
pub use format::{AudioFormat, AudioLayout, ChannelPosition, SampleFormat};
