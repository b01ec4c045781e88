//! Decimal precision helpers.
//!
//! Precision is always read from the literal text of a value: "12.340" has
//! three decimals even though the parsed float prints as `12.34`. Display
//! precision derived here is a hint only; stored values keep full `f64`
//! precision.

use crate::data::{Value, parse_number};

/// Upper bound applied by [`round_to_decimals`].
pub const MAX_ROUND_DECIMALS: u32 = 9;

/// Counts the characters after the decimal point of a numeric token. A
/// leading sign is ignored and an exponent suffix is not part of the
/// fraction, so `"1.50e3"` reports 2.
pub fn count_decimals(token: &str) -> u32 {
    let trimmed = token.trim();
    let unsigned = trimmed
        .strip_prefix(['+', '-'])
        .unwrap_or(trimmed);
    let Some(dot) = unsigned.find('.') else {
        return 0;
    };
    let fraction = &unsigned[dot + 1..];
    let mantissa = fraction
        .find(['e', 'E'])
        .map_or(fraction, |idx| &fraction[..idx]);
    mantissa.chars().count() as u32
}

/// Shortest text for a parsed number. Magnitudes below 1e-6 or from 1e21
/// up use exponent notation, so `1e-7` reads as `"1e-7"` rather than
/// `"0.0000001"`.
fn number_literal(n: f64) -> String {
    let magnitude = n.abs();
    if magnitude != 0.0 && !(1e-6..1e21).contains(&magnitude) {
        format!("{n:e}")
    } else {
        n.to_string()
    }
}

/// Literal precision of a cell, or `None` when the cell is not a numeric
/// literal. Text must parse as a plain number (grouping commas disqualify it).
pub fn decimals_from_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) if n.is_finite() => Some(count_decimals(&number_literal(*n))),
        Value::Text(text) => {
            let trimmed = text.trim();
            parse_number(trimmed)?;
            Some(count_decimals(trimmed))
        }
        _ => None,
    }
}

/// Rounds half away from zero at `decimals` places, capped at
/// [`MAX_ROUND_DECIMALS`]. Non-finite values come back untouched.
pub fn round_to_decimals(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let capped = decimals.min(MAX_ROUND_DECIMALS);
    let factor = 10f64.powi(capped as i32);
    (value * factor).round() / factor
}

/// Precision worth advertising: zero carries no display information.
pub fn positive(decimals: Option<u32>) -> Option<u32> {
    decimals.filter(|d| *d > 0)
}
