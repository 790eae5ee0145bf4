//! Cell formatting for the dashboard.

use chrono::{DateTime, Local, Utc};
use rust_decimal::Decimal;

use crate::utils::decimal::{mean, to_percent};

const MISSING: &str = "--";

/// Funding rate as a signed percentage with four decimals, e.g. `+0.0100%`.
pub fn format_rate(rate: Option<Decimal>) -> String {
    let Some(mut percent) = rate.and_then(to_percent).map(|p| p.round_dp(4)) else {
        return MISSING.to_string();
    };
    if percent.is_zero() {
        percent = Decimal::ZERO;
    }
    if percent > Decimal::ZERO {
        format!("+{:.4}%", percent)
    } else {
        format!("{:.4}%", percent)
    }
}

/// USD amount with thousands separators, e.g. `$1,234.57` or `-$12.00`.
pub fn format_usd(amount: Option<Decimal>) -> String {
    let Some(amount) = amount else {
        return MISSING.to_string();
    };
    let rounded = amount.round_dp(2);
    let sign = if rounded < Decimal::ZERO { "-" } else { "" };
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    format!("{}${}.{}", sign, group_thousands(whole), fraction)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Local wall-clock time of an update, or `never`.
pub fn format_updated(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string())
}

/// Shrink `series` to at most `points` values by averaging equal-width buckets.
pub fn downsample(series: &[Decimal], points: usize) -> Vec<Decimal> {
    if points == 0 {
        return Vec::new();
    }
    if series.len() <= points {
        return series.to_vec();
    }
    (0..points)
        .filter_map(|i| {
            let start = i * series.len() / points;
            let end = ((i + 1) * series.len() / points).max(start + 1);
            mean(&series[start..end])
        })
        .collect()
}

/// Sign of a sparkline cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Positive,
    Negative,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparkCell {
    pub glyph: char,
    pub tone: Tone,
}

/// One cell per value, shaded by magnitude relative to the largest.
pub fn sparkline(series: &[Decimal]) -> Vec<SparkCell> {
    let max = series
        .iter()
        .map(|v| v.abs())
        .max()
        .filter(|m| !m.is_zero())
        .unwrap_or(Decimal::ONE);
    let high = Decimal::new(66, 2);
    let mid = Decimal::new(33, 2);

    series
        .iter()
        .map(|value| {
            let magnitude = value.abs() / max;
            let glyph = if magnitude > high {
                '█'
            } else if magnitude > mid {
                '▓'
            } else {
                '▒'
            };
            let tone = if *value > Decimal::ZERO {
                Tone::Positive
            } else if *value < Decimal::ZERO {
                Tone::Negative
            } else {
                Tone::Flat
            };
            SparkCell { glyph, tone }
        })
        .collect()
}
