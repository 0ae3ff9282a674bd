//! Numeric coercion for monetary and quantity values.
//!
//! Values reach the analytics path as JSON numbers, numeric strings, decimal
//! text selected from the database, or garbage. Everything here folds
//! unparseable, null and non-finite input to zero so no aggregate ever
//! becomes `NaN`.

use serde_json::Value;

/// Coerce a JSON value to a finite `f64`; anything else is `0.0`.
#[must_use]
pub fn coerce_f64(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => parse_decimal(Some(s)),
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => 0.0,
    };
    finite_or_zero(parsed)
}

/// Coerce a JSON value to a non-negative integer; fractions are truncated.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn coerce_u64(value: &Value) -> u64 {
    if let Some(n) = value.as_u64() {
        return n;
    }
    let float = coerce_f64(value);
    if float <= 0.0 {
        0
    } else if float >= u64::MAX as f64 {
        u64::MAX
    } else {
        float.trunc() as u64
    }
}

/// Parse decimal text (as produced by `NUMERIC::text`); `None` or garbage is `0.0`.
#[must_use]
pub fn parse_decimal(text: Option<&str>) -> f64 {
    text.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .map_or(0.0, finite_or_zero)
}

/// Round half away from zero to `decimals` places.
#[must_use]
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(i32::try_from(decimals).unwrap_or(i32::MAX));
    let rounded = (value * factor).round() / factor;
    finite_or_zero(rounded)
}

/// `100 * part / whole` rounded to `decimals`; zero when `whole` is zero.
#[must_use]
pub fn percentage(part: f64, whole: f64, decimals: u32) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    round_to(part / whole * 100.0, decimals)
}

/// `numerator / denominator` rounded to `decimals`; zero when the denominator is zero.
#[must_use]
pub fn ratio(numerator: f64, denominator: f64, decimals: u32) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    round_to(numerator / denominator, decimals)
}

/// Widen a count for ratio arithmetic.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub const fn count_f64(count: u64) -> f64 {
    count as f64
}

const fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn numbers_and_numeric_strings_parse() {
        assert!((coerce_f64(&json!(12.5)) - 12.5).abs() < f64::EPSILON);
        assert!((coerce_f64(&json!("250.00")) - 250.0).abs() < f64::EPSILON);
        assert_eq!(coerce_u64(&json!("3")), 3);
        assert_eq!(coerce_u64(&json!(2.9)), 2);
    }

    #[test]
    fn garbage_is_zero() {
        assert!(coerce_f64(&json!(null)).abs() < f64::EPSILON);
        assert!(coerce_f64(&json!("abc")).abs() < f64::EPSILON);
        assert!(coerce_f64(&json!("NaN")).abs() < f64::EPSILON);
        assert!(coerce_f64(&json!("inf")).abs() < f64::EPSILON);
        assert!(coerce_f64(&json!({ "amount": 1 })).abs() < f64::EPSILON);
        assert_eq!(coerce_u64(&json!(-4)), 0);
        assert!(parse_decimal(None).abs() < f64::EPSILON);
    }

    #[test]
    fn percentage_guards_zero_denominator() {
        assert!(percentage(5.0, 0.0, 2).abs() < f64::EPSILON);
        assert!((percentage(2.0, 10.0, 2) - 20.0).abs() < f64::EPSILON);
        assert!((percentage(1.0, 3.0, 2) - 33.33).abs() < 1e-9);
    }

    #[test]
    fn round_to_two_places() {
        assert!((round_to(175.005, 2) - 175.01).abs() < 0.011);
        assert!((round_to(2.0 / 3.0, 1) - 0.7).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn coerced_strings_are_always_finite(s in ".*") {
            prop_assert!(coerce_f64(&Value::String(s)).is_finite());
        }

        #[test]
        fn percentage_is_finite(part in any::<f64>(), whole in any::<f64>()) {
            prop_assert!(percentage(part, whole, 2).is_finite());
        }
    }
}
