//! Property list parser.
//!
//! Converter options are written as whitespace-separated `key=value` pairs:
//!
//! ```text
//! dither-method=tpdf noise-shaping-method=high quantization-granularity=1
//! ```
//!
//! Keys are ASCII letters, digits, `-` and `_`. A value is a quoted string
//! or a bare word; bare words that read as integers become
//! [`PropertyValue::Integer`].

use crate::error::{Error, Result};
use winnow::Parser;
use winnow::ascii::multispace0;
use winnow::combinator::{alt, delimited, repeat, separated_pair};
use winnow::error::ContextError;
use winnow::token::{take_till, take_while};

type WResult<T> = std::result::Result<T, ContextError>;

/// A property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    /// Text, quoted or bare.
    String(String),
    /// A bare word holding an integer.
    Integer(i64),
}

impl PropertyValue {
    /// The value as text.
    pub fn as_string(&self) -> String {
        match self {
            PropertyValue::String(s) => s.clone(),
            PropertyValue::Integer(i) => i.to_string(),
        }
    }

    /// The value as an integer, parsing text if needed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            PropertyValue::String(s) => s.parse().ok(),
        }
    }

    /// The value as a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_i64().and_then(|i| u64::try_from(i).ok())
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

/// Parse a property list.
///
/// # Example
///
/// ```rust
/// use pcm_convert::config::{PropertyValue, parse_properties};
///
/// let props = parse_properties("dither-method=tpdf quantization-granularity=2").unwrap();
/// assert_eq!(props.len(), 2);
/// assert_eq!(props[1].1, PropertyValue::Integer(2));
/// ```
pub fn parse_properties(input: &str) -> Result<Vec<(String, PropertyValue)>> {
    repeat(0.., delimited(multispace0, property, multispace0))
        .parse(input)
        .map_err(|e| Error::Parse(format!("invalid property list: {e}")))
}

fn property(input: &mut &str) -> WResult<(String, PropertyValue)> {
    separated_pair(key, (multispace0, '=', multispace0), value)
        .map(|(key, value): (&str, PropertyValue)| (key.to_string(), value))
        .parse_next(input)
}

fn key<'a>(input: &mut &'a str) -> WResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        .parse_next(input)
}

fn value(input: &mut &str) -> WResult<PropertyValue> {
    alt((
        quoted.map(PropertyValue::from),
        word.map(|word: &str| match word.parse() {
            Ok(n) => PropertyValue::Integer(n),
            Err(_) => PropertyValue::from(word),
        }),
    ))
    .parse_next(input)
}

fn quoted<'a>(input: &mut &'a str) -> WResult<&'a str> {
    alt((
        delimited('"', take_till(0.., '"'), '"'),
        delimited('\'', take_till(0.., '\''), '\''),
    ))
    .parse_next(input)
}

fn word<'a>(input: &mut &'a str) -> WResult<&'a str> {
    take_while(1.., |c: char| !c.is_whitespace() && c != '=').parse_next(input)
}
