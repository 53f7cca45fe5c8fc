//! Parser for the status line served at `/home.cgi`.
//!
//! The inverter answers with a single whitespace-separated record:
//!
//! ```text
//! 1 1 EAB9618A0399 RSQMMVXNNPJMNWHY M11 17A31-727R+17829-719R 10:58 05/10/2019 0 1 BD500001018A0080 4978 14.52 OK Error
//! 0 1 2            3                4   5                     6     7          8 9 10               11   12    13 14
//! ```
//!
//! Fields carry no names, so values are picked by position.

use std::str;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;
use types::ParsedReading;

/// Instantaneous generated power, integer watts.
pub const GENERATED_POWER_INDEX: usize = 11;
/// Energy generated today, decimal kWh.
pub const DAILY_ENERGY_INDEX: usize = 12;
/// Fewest tokens that still contain both consumed fields.
pub const MIN_FIELD_COUNT: usize = DAILY_ENERGY_INDEX + 1;
/// Length of the documented record.
pub const EXPECTED_FIELD_COUNT: usize = 15;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("status page is not valid utf-8")]
    Encoding,
    #[error("expected at least 13 fields, got {found}")]
    TooFewFields { found: usize },
    #[error("generated power field {0:?} is not an unsigned integer")]
    InvalidPower(String),
    #[error("daily energy field {0:?} is not a non-negative decimal")]
    InvalidEnergy(String),
}

/// Tokenised view over one status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine<'a> {
    tokens: Vec<&'a str>,
}

impl<'a> StatusLine<'a> {
    pub fn split(text: &'a str) -> Self {
        Self {
            tokens: text.split_whitespace().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn field(&self, index: usize) -> Option<&'a str> {
        self.tokens.get(index).copied()
    }

    pub fn generated_power(&self) -> Result<u32, ParseError> {
        let token = self.required(GENERATED_POWER_INDEX)?;
        token
            .parse::<u32>()
            .map_err(|_| ParseError::InvalidPower(token.to_string()))
    }

    pub fn daily_energy(&self) -> Result<f64, ParseError> {
        let token = self.required(DAILY_ENERGY_INDEX)?;
        match token.parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
            _ => Err(ParseError::InvalidEnergy(token.to_string())),
        }
    }

    fn required(&self, index: usize) -> Result<&'a str, ParseError> {
        self.field(index)
            .ok_or(ParseError::TooFewFields { found: self.len() })
    }
}

/// Extracts generated power and daily energy from a raw status page.
pub fn parse_status(raw: &[u8], taken_at: DateTime<Utc>) -> Result<ParsedReading, ParseError> {
    let text = str::from_utf8(raw).map_err(|_| ParseError::Encoding)?;
    let line = StatusLine::split(text);

    if line.len() < MIN_FIELD_COUNT {
        return Err(ParseError::TooFewFields { found: line.len() });
    }
    if line.len() != EXPECTED_FIELD_COUNT {
        debug!(
            fields = line.len(),
            expected = EXPECTED_FIELD_COUNT,
            "status line length differs from documented layout"
        );
    }

    Ok(ParsedReading::new(
        line.generated_power()?,
        line.daily_energy()?,
        taken_at,
    ))
}
