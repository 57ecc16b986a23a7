//! Converter configuration.
//!
//! [`ConverterConfig`] is built either with the `with_*` methods or from a
//! property string in the usual `key=value` syntax:
//!
//! ```rust
//! use pcm_convert::config::{ConverterConfig, DitherMethod, NoiseShapingMethod};
//!
//! let config: ConverterConfig = "dither-method=tpdf noise-shaping-method=high"
//!     .parse()
//!     .unwrap();
//! assert_eq!(config.dither, DitherMethod::Tpdf);
//! assert_eq!(config.noise_shaping, NoiseShapingMethod::High);
//! assert_eq!(config.quantization, 1);
//! ```

pub mod parser;

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub use parser::{PropertyValue, parse_properties};

/// Property key selecting the dither method.
pub const DITHER_METHOD: &str = "dither-method";
/// Property key selecting the noise shaping method.
pub const NOISE_SHAPING_METHOD: &str = "noise-shaping-method";
/// Property key selecting the quantization granularity.
pub const QUANTIZATION_GRANULARITY: &str = "quantization-granularity";

/// Dither noise added before rounding to a lower bit depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DitherMethod {
    /// No dither.
    #[default]
    None,
    /// Rectangular probability density.
    Rpdf,
    /// Triangular probability density.
    Tpdf,
    /// High-frequency triangular probability density.
    TpdfHf,
}

impl DitherMethod {
    /// Canonical property name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DitherMethod::None => "none",
            DitherMethod::Rpdf => "rectangular-pdf",
            DitherMethod::Tpdf => "triangular-pdf",
            DitherMethod::TpdfHf => "triangular-high-frequency",
        }
    }
}

impl fmt::Display for DitherMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DitherMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(DitherMethod::None),
            "rectangular-pdf" | "rpdf" => Ok(DitherMethod::Rpdf),
            "triangular-pdf" | "tpdf" => Ok(DitherMethod::Tpdf),
            "triangular-high-frequency" | "tpdf-hf" => Ok(DitherMethod::TpdfHf),
            other => Err(Error::Config(format!("unknown dither method '{other}'"))),
        }
    }
}

/// Noise shaping filter applied to the quantization error.
///
/// Ordered by strength, so `method > NoiseShapingMethod::ErrorFeedback`
/// selects the multi-tap filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum NoiseShapingMethod {
    /// No noise shaping.
    #[default]
    None,
    /// Single-tap error feedback.
    ErrorFeedback,
    /// Two-tap filter.
    Simple,
    /// Five-tap filter.
    Medium,
    /// Eight-tap filter.
    High,
}

impl NoiseShapingMethod {
    /// Canonical property name.
    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseShapingMethod::None => "none",
            NoiseShapingMethod::ErrorFeedback => "error-feedback",
            NoiseShapingMethod::Simple => "simple",
            NoiseShapingMethod::Medium => "medium",
            NoiseShapingMethod::High => "high",
        }
    }
}

impl fmt::Display for NoiseShapingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoiseShapingMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(NoiseShapingMethod::None),
            "error-feedback" => Ok(NoiseShapingMethod::ErrorFeedback),
            "simple" => Ok(NoiseShapingMethod::Simple),
            "medium" => Ok(NoiseShapingMethod::Medium),
            "high" => Ok(NoiseShapingMethod::High),
            other => Err(Error::Config(format!(
                "unknown noise shaping method '{other}'"
            ))),
        }
    }
}

/// Options controlling quantization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConverterConfig {
    /// Requested dither method.
    pub dither: DitherMethod,
    /// Requested noise shaping method.
    pub noise_shaping: NoiseShapingMethod,
    /// Quantization granularity in output sample units; always at least 1.
    pub quantization: u32,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            dither: DitherMethod::None,
            noise_shaping: NoiseShapingMethod::None,
            quantization: 1,
        }
    }
}

impl ConverterConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dither method.
    pub fn with_dither(mut self, dither: DitherMethod) -> Self {
        self.dither = dither;
        self
    }

    /// Set the noise shaping method.
    pub fn with_noise_shaping(mut self, noise_shaping: NoiseShapingMethod) -> Self {
        self.noise_shaping = noise_shaping;
        self
    }

    /// Set the quantization granularity. Zero is treated as 1.
    pub fn with_quantization(mut self, quantization: u32) -> Self {
        self.quantization = quantization.max(1);
        self
    }

    /// Build a configuration from properties, starting from the defaults.
    pub fn from_properties<'a, I>(properties: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a (String, PropertyValue)>,
    {
        let mut config = Self::default();
        config.apply(properties)?;
        Ok(config)
    }

    /// Merge properties into this configuration.
    ///
    /// All properties are validated first; on error `self` is left unchanged.
    pub fn apply<'a, I>(&mut self, properties: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a (String, PropertyValue)>,
    {
        let mut next = *self;
        for (key, value) in properties {
            match key.as_str() {
                DITHER_METHOD => next.dither = value.as_string().parse()?,
                NOISE_SHAPING_METHOD => next.noise_shaping = value.as_string().parse()?,
                QUANTIZATION_GRANULARITY => {
                    next.quantization = value
                        .as_u64()
                        .and_then(|v| u32::try_from(v).ok())
                        .filter(|&v| v > 0)
                        .ok_or_else(|| {
                            Error::Config(format!(
                                "{QUANTIZATION_GRANULARITY} must be a positive integer, got '{}'",
                                value.as_string()
                            ))
                        })?;
                }
                other => return Err(Error::Config(format!("unknown option '{other}'"))),
            }
        }
        *self = next;
        Ok(())
    }

    /// Snapshot of every option as properties.
    pub fn to_properties(&self) -> Vec<(String, PropertyValue)> {
        vec![
            (
                DITHER_METHOD.to_string(),
                PropertyValue::String(self.dither.as_str().to_string()),
            ),
            (
                NOISE_SHAPING_METHOD.to_string(),
                PropertyValue::String(self.noise_shaping.as_str().to_string()),
            ),
            (
                QUANTIZATION_GRANULARITY.to_string(),
                PropertyValue::Integer(self.quantization as i64),
            ),
        ]
    }
}

impl fmt::Display for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{DITHER_METHOD}={} {NOISE_SHAPING_METHOD}={} {QUANTIZATION_GRANULARITY}={}",
            self.dither, self.noise_shaping, self.quantization
        )
    }
}

impl FromStr for ConverterConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_properties(&parse_properties(s)?)
    }
}
