//! Platform-agnostic types for water-quality sensor readings.
//!
//! This crate holds the data model shared by the pipeline (aquamon-core)
//! and its front ends: the canonical [`Reading`], the untyped [`RawRecord`]
//! as stored remotely, the seven [`Metric`]s with their physical ranges,
//! timestamp parsing and device-id ordering.
//!
//! # Example
//!
//! ```
//! use aquamon_types::{Metric, Reading};
//!
//! let reading = Reading::new("tank-1").with_value(Metric::Ec, Some(450.0));
//! assert_eq!(reading.value(Metric::Ec), Some(450.0));
//! ```

pub mod device;
pub mod error;
pub mod timestamp;
pub mod types;

pub use device::{compare_device_ids, sorted_devices};
pub use error::{ParseError, ParseResult};
pub use timestamp::{parse_date, parse_timestamp, parse_timestamp_str, parse_timestamp_strict};
pub use types::{Metric, MetricRange, RawRecord, Reading};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_sorted_devices_is_sorted_and_unique(ids in proptest::collection::vec("[a-c]{0,3}-?[0-9]{0,3}", 0..20)) {
            let sorted = sorted_devices(&ids);
            for pair in sorted.windows(2) {
                prop_assert_eq!(compare_device_ids(&pair[0], &pair[1]), std::cmp::Ordering::Less);
            }
            for id in &ids {
                prop_assert!(sorted.contains(id));
            }
        }

        #[test]
        fn prop_parse_timestamp_str_never_panics(s in "\\PC{0,40}") {
            let _ = parse_timestamp_str(&s);
        }
    }

    #[test]
    fn test_metric_range_lookup_through_reexports() {
        assert_eq!(Metric::Turbidity.range(), MetricRange::new(0.0, 4000.0));
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::UnknownMetric("foo".to_string());
        assert_eq!(err.to_string(), "Unknown metric: foo");
    }
}
