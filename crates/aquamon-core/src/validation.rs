//! Clamping and rounding of raw numeric fields into their physical domain.
//!
//! Out-of-range values are clamped, never rejected. The only way a value
//! is dropped is when it is absent or not finite.
//!
//! ```
//! use aquamon_core::validation::{validate, validate_metric};
//! use aquamon_types::Metric;
//!
//! assert_eq!(validate(Some(15.234), 0.0, 14.0), Some(14.0));
//! assert_eq!(validate(Some(7.456), 0.0, 14.0), Some(7.46));
//! assert_eq!(validate(Some(f64::NAN), 0.0, 14.0), None);
//! assert_eq!(validate_metric(Some(-3000.0), Metric::Orp), Some(-2000.0));
//! ```

use aquamon_types::{Metric, MetricRange};

/// Round to two decimal places, half away from zero.
///
/// Values too large to scale are returned unchanged.
#[must_use]
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    let rounded = scaled.round() / 100.0;
    // Avoid emitting negative zero.
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Clamp `value` into `[min, max]` and round to two decimals.
///
/// Returns `None` for absent or non-finite input, for an empty or NaN range,
/// and when the range collapses to a single infinite point.
#[must_use]
pub fn validate(value: Option<f64>, min: f64, max: f64) -> Option<f64> {
    if min.is_nan() || max.is_nan() || min > max {
        return None;
    }
    let value = value.filter(|v| v.is_finite())?;
    let rounded = round2(value.clamp(min, max));
    // Rounding may step just past a bound that is not a multiple of 0.01.
    Some(rounded.clamp(min, max)).filter(|v| v.is_finite())
}

/// [`validate`] against a [`MetricRange`].
#[must_use]
pub fn validate_range(value: Option<f64>, range: MetricRange) -> Option<f64> {
    validate(value, range.min, range.max)
}

/// [`validate`] against the physical range of `metric`.
#[must_use]
pub fn validate_metric(value: Option<f64>, metric: Metric) -> Option<f64> {
    validate_range(value, metric.range())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_absent_and_non_finite() {
        assert_eq!(validate(None, 0.0, 14.0), None);
        assert_eq!(validate(Some(f64::NAN), 0.0, 14.0), None);
        assert_eq!(validate(Some(f64::INFINITY), 0.0, 14.0), None);
        assert_eq!(validate(Some(f64::NEG_INFINITY), 0.0, 14.0), None);
    }

    #[test]
    fn test_clamps_both_ends() {
        assert_eq!(validate(Some(-1.0), 0.0, 14.0), Some(0.0));
        assert_eq!(validate(Some(20.0), 0.0, 14.0), Some(14.0));
        assert_eq!(validate_metric(Some(250_000.0), Metric::Ec), Some(100_000.0));
        assert_eq!(validate_metric(Some(-80.0), Metric::Temperature), Some(-50.0));
    }

    #[test]
    fn test_rounds_to_two_decimals() {
        assert_eq!(validate(Some(7.004), 0.0, 14.0), Some(7.0));
        assert_eq!(validate(Some(7.005), 0.0, 14.0), Some(7.01));
        assert_eq!(validate(Some(-12.345), -2000.0, 2000.0), Some(-12.35));
    }

    #[test]
    fn test_negative_zero_normalized() {
        let v = validate(Some(-0.001), -2000.0, 2000.0).unwrap();
        assert_eq!(v, 0.0);
        assert!(v.is_sign_positive());
    }

    #[test]
    fn test_inverted_or_nan_range_yields_none() {
        assert_eq!(validate(Some(1.0), 5.0, 0.0), None);
        assert_eq!(validate(Some(1.0), f64::NAN, 5.0), None);
        assert_eq!(validate(Some(1.0), 0.0, f64::NAN), None);
        assert_eq!(validate(Some(1.0), f64::INFINITY, f64::INFINITY), None);
    }

    #[test]
    fn test_huge_values_stay_finite() {
        assert_eq!(validate(Some(1.0e307), 0.0, f64::MAX), Some(1.0e307));
        assert_eq!(validate(Some(f64::MAX), 0.0, f64::MAX), Some(f64::MAX));
        assert_eq!(round2(f64::MAX), f64::MAX);
    }

    #[test]
    fn test_rounding_never_leaves_range() {
        assert_eq!(validate(Some(0.006), 0.0, 0.005), Some(0.005));
    }

    #[test]
    fn test_boundaries_inclusive() {
        assert_eq!(validate_metric(Some(14.0), Metric::Ph), Some(14.0));
        assert_eq!(validate_metric(Some(0.0), Metric::Ph), Some(0.0));
        assert_eq!(validate_metric(Some(-2000.0), Metric::Orp), Some(-2000.0));
    }

    proptest! {
        #[test]
        fn prop_result_within_range(v in any::<f64>(), metric_idx in 0usize..7) {
            let metric = Metric::ALL[metric_idx];
            let range = metric.range();
            match validate_metric(Some(v), metric) {
                Some(out) => {
                    prop_assert!(v.is_finite());
                    prop_assert!(out >= range.min && out <= range.max);
                    prop_assert_eq!(out, round2(v.clamp(range.min, range.max)));
                }
                None => prop_assert!(!v.is_finite()),
            }
        }

        #[test]
        fn prop_any_range_never_panics(
            v in any::<f64>(),
            min in any::<f64>(),
            max in any::<f64>(),
        ) {
            match validate(Some(v), min, max) {
                Some(out) => {
                    prop_assert!(min <= max);
                    prop_assert!(out.is_finite());
                    prop_assert!(out >= min && out <= max);
                }
                None => {
                    let empty_range = min.is_nan() || max.is_nan() || min > max;
                    let infinite_point = min == max && min.is_infinite();
                    prop_assert!(empty_range || infinite_point || !v.is_finite());
                }
            }
        }

        #[test]
        fn prop_idempotent(v in -1.0e6f64..1.0e6) {
            let once = validate(Some(v), -2000.0, 2000.0);
            prop_assert_eq!(validate(once, -2000.0, 2000.0), once);
        }
    }
}
