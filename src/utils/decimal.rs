//! Decimal helpers for funding rate parsing and arithmetic.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A numeric field that venues encode either as a JSON string or a bare JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Text(String),
    Number(serde_json::Number),
}

impl RawNumber {
    /// Parse into a decimal, accepting plain and scientific notation.
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            RawNumber::Text(s) => parse_decimal(s),
            RawNumber::Number(n) => parse_decimal(&n.to_string()),
        }
    }

    /// The literal text as reported by the venue, if it was a string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawNumber::Text(s) => Some(s.as_str()),
            RawNumber::Number(_) => None,
        }
    }
}

impl fmt::Display for RawNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawNumber::Text(s) => f.write_str(s),
            RawNumber::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for RawNumber {
    fn from(value: &str) -> Self {
        RawNumber::Text(value.to_string())
    }
}

/// Parse a decimal string. Returns `None` for empty, `NaN`, infinite or malformed input.
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .ok()
        .or_else(|| Decimal::from_scientific(&trimmed.to_ascii_lowercase()).ok())
}

/// Fractional rate to percent (0.0001 -> 0.01), `None` on overflow.
pub fn to_percent(rate: Decimal) -> Option<Decimal> {
    rate.checked_mul(dec!(100))
}

/// Calculate basis points (1 bp = 0.01%)
pub fn to_basis_points(rate: Decimal) -> Option<Decimal> {
    rate.checked_mul(dec!(10000))
}

/// Arithmetic mean, `None` for an empty slice or an overflowing sum.
pub fn mean(values: &[Decimal]) -> Option<Decimal> {
    let total = sum(values)?;
    Some(total / Decimal::from(values.len()))
}

/// Sum, `None` for an empty slice or on overflow.
pub fn sum(values: &[Decimal]) -> Option<Decimal> {
    let (first, rest) = values.split_first()?;
    rest.iter().try_fold(*first, |acc, v| acc.checked_add(*v))
}
