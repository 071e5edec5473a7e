//! Minor-unit currency helpers.
//!
//! Amounts are stored and exchanged as integer minor units (e.g. paise,
//! cents) plus an ISO 4217 currency code. Conversion to a display string is
//! a pure function applied at presentation time and never inside persisted
//! engine state.

/// Upper bound on stored amounts, in minor units.
pub const MAX_AMOUNT_MINOR: i64 = 100_000_000_000_000;

/// Converts a major-unit amount to minor units (x100).
pub fn to_minor_units(major: f64) -> i64 {
    (major * 100.0).round() as i64
}

/// Converts minor units back to a major-unit amount (/100).
pub fn to_major_units(minor: i64) -> f64 {
    minor as f64 / 100.0
}

/// Returns `true` if the amount is non-negative and within bounds.
pub fn validate_amount_minor(minor: i64) -> bool {
    (0..=MAX_AMOUNT_MINOR).contains(&minor)
}

/// Formats a minor-unit amount as a display string, e.g. `INR 1,234.56`.
pub fn format_amount(minor: i64, currency: &str) -> String {
    let negative = minor < 0;
    let abs = minor.unsigned_abs();
    let whole = abs / 100;
    let cents = abs % 100;
    let mut grouped = String::new();
    let digits = whole.to_string();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if negative { "-" } else { "" };
    format!("{currency} {sign}{grouped}.{cents:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_unit_round_trip() {
        assert_eq!(to_minor_units(1234.56), 123_456);
        assert_eq!(to_major_units(123_456), 1234.56);
        assert_eq!(to_minor_units(0.005), 1);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(123_456, "INR"), "INR 1,234.56");
        assert_eq!(format_amount(5, "USD"), "USD 0.05");
        assert_eq!(format_amount(100_000_000, "EUR"), "EUR 1,000,000.00");
        assert_eq!(format_amount(-150, "USD"), "USD -1.50");
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount_minor(0));
        assert!(validate_amount_minor(MAX_AMOUNT_MINOR));
        assert!(!validate_amount_minor(-1));
        assert!(!validate_amount_minor(MAX_AMOUNT_MINOR + 1));
    }
}
