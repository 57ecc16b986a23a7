//! Error types for pcm-convert.

use thiserror::Error;

use crate::format::AudioLayout;

/// Result type alias using pcm-convert's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for conversion setup and execution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A format descriptor is malformed (zero rate, zero channels, bad positions).
    #[error("invalid audio format: {0}")]
    InvalidFormat(String),

    /// Input and output sample rates differ; rate conversion is not supported.
    #[error("sample rate mismatch: {input} Hz -> {output} Hz")]
    RateMismatch {
        /// Input sample rate.
        input: u32,
        /// Output sample rate.
        output: u32,
    },

    /// Input and output frame layouts differ.
    #[error("layout mismatch: {input:?} -> {output:?}")]
    LayoutMismatch {
        /// Input layout.
        input: AudioLayout,
        /// Output layout.
        output: AudioLayout,
    },

    /// The channel count changes but one side carries no channel positions.
    #[error("cannot remap {input} -> {output} channels without channel positions")]
    UnpositionedChannels {
        /// Input channel count.
        input: u16,
        /// Output channel count.
        output: u16,
    },

    /// Unknown configuration option or invalid option value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Malformed textual configuration.
    #[error("parse error: {0}")]
    Parse(String),

    /// Caller-supplied buffers do not match the negotiated formats.
    #[error("buffer error: {0}")]
    Buffer(String),
}
