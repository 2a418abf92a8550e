//! Numeric normalization
//!
//! Converts vendor numeric tokens (often scientific notation such as `1.23E+5`)
//! to canonical decimal strings, and renders dollar amounts with thousands separators.

use crate::error::AggregatorError;
use crate::Result;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Parse a numeric token (scientific or plain) into a `Decimal`
pub fn parse_decimal(token: &str) -> Result<Decimal> {
    let trimmed = token.trim();
    let parsed = if trimmed.contains(['e', 'E']) {
        Decimal::from_scientific(trimmed)
    } else {
        Decimal::from_str(trimmed)
    };
    parsed.map_err(|e| AggregatorError::ParseFailure(format!("invalid numeric token '{}': {}", token, e)))
}

/// Convert a possibly scientific-notation token to a canonical decimal string.
///
/// `"1.23E+4"` → `"12300"`, `"-5e-3"` → `"-0.005"`, `"042.50"` → `"42.5"`.
pub fn normalize(token: &str) -> Result<String> {
    Ok(parse_decimal(token)?.normalize().to_string())
}

/// Round half away from zero to `places` decimal places
pub fn round_half_up(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}

/// Render a dollar amount: two decimals, thousands separators on the integer part.
///
/// `1234567.891` → `"$1,234,567.89"`; negative values render as `"-$1,234.50"`.
pub fn format_currency(amount: Decimal) -> String {
    let rounded = round_half_up(amount, 2);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let fixed = format!("{:.2}", rounded.abs());

    let (integral, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    format!(
        "{}${}.{}",
        if negative { "-" } else { "" },
        group_thousands(integral),
        cents
    )
}

fn group_thousands(integral: &str) -> String {
    let n = integral.len();
    let mut out = String::with_capacity(n + n / 3);
    for (i, ch) in integral.chars().enumerate() {
        if i > 0 && (n - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_normalize_scientific() {
        assert_eq!(normalize("1.23E+4").unwrap(), "12300");
        assert_eq!(normalize("1.23e+5").unwrap(), "123000");
        assert_eq!(normalize("3.5283e11").unwrap(), "352830000000");
        assert_eq!(normalize("-5e-3").unwrap(), "-0.005");
        assert_eq!(normalize("3.52583e11").unwrap(), "352583000000");
        assert_eq!(normalize("0e0").unwrap(), "0");
        assert_eq!(normalize(" 1.5 ").unwrap(), "1.5");
    }

    #[test]
    fn test_normalize_strips_redundant_zeros() {
        assert_eq!(normalize("042.50").unwrap(), "42.5");
        assert_eq!(normalize("0.000").unwrap(), "0");
        assert_eq!(normalize("-0e5").unwrap(), "0");
        assert_eq!(normalize(".5").unwrap(), "0.5");
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize("").is_err());
        assert!(normalize("e+5").is_err());
        assert!(normalize("1.2.3").is_err());
        assert!(normalize("12abc").is_err());
        assert!(normalize("1e+").is_err());
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(dec("1234567.891")), "$1,234,567.89");
        assert_eq!(format_currency(dec("999.995")), "$1,000.00");
        assert_eq!(format_currency(dec("12")), "$12.00");
        assert_eq!(format_currency(dec("0")), "$0.00");
        assert_eq!(format_currency(dec("-1234.5")), "-$1,234.50");
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(dec("2.345"), 2), dec("2.35"));
        assert_eq!(round_half_up(dec("-2.345"), 2), dec("-2.35"));
        assert_eq!(round_half_up(dec("2.344"), 2), dec("2.34"));
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("1.23E+4").unwrap(), dec("12300"));
        assert_eq!(parse_decimal("-5e-3").unwrap(), dec("-0.005"));
        assert!(parse_decimal("9e+40").is_err());
        assert!(parse_decimal("1e-40").is_err());
    }
}
