//! Device/date filtering and per-metric aggregation over the reading cache.
//!
//! Filtering is day-granular: a reading matches a `[start, end]` range when
//! its calendar day, taken at the configured UTC offset, lies inside the
//! range. Readings without a timestamp never match an active date bound.
//!
//! Aggregation ignores every value `<= 0`. Zero is the "no data" placeholder
//! of the upstream sensors, so a genuine negative reading (ORP, temperature
//! below freezing) is dropped from the statistics as well.

use serde::Serialize;
use time::{Date, OffsetDateTime, UtcOffset};

use aquamon_types::{Metric, Reading, sorted_devices};

/// Inclusive range of calendar days; either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayRange {
    /// First day included.
    pub start: Option<Date>,
    /// Last day included.
    pub end: Option<Date>,
}

impl DayRange {
    /// Create a range.
    pub fn new(start: Option<Date>, end: Option<Date>) -> Self {
        Self { start, end }
    }

    /// Whether no bound is set.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Whether a reading taken at `timestamp` falls inside the range.
    #[must_use]
    pub fn contains(&self, timestamp: Option<OffsetDateTime>, offset: UtcOffset) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(ts) = timestamp else {
            return false;
        };
        let day = ts.to_offset(offset).date();
        self.start.is_none_or(|start| day >= start) && self.end.is_none_or(|end| day <= end)
    }
}

/// Device and date-range selection applied to the cache.
///
/// # Example
///
/// ```
/// use aquamon_core::filter::ReadingFilter;
/// use aquamon_types::Reading;
/// use time::UtcOffset;
///
/// let cache = vec![Reading::new("A"), Reading::new("B")];
/// let filtered = ReadingFilter::new().device("A").apply(&cache, UtcOffset::UTC);
/// assert_eq!(filtered.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadingFilter {
    /// Only readings of this device; `None` selects all devices.
    pub device: Option<String>,
    /// Day range.
    pub days: DayRange,
}

impl ReadingFilter {
    /// A filter matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one device.
    #[must_use]
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Set the first day.
    #[must_use]
    pub fn start_date(mut self, date: Date) -> Self {
        self.days.start = Some(date);
        self
    }

    /// Set the last day.
    #[must_use]
    pub fn end_date(mut self, date: Date) -> Self {
        self.days.end = Some(date);
        self
    }

    /// Whether a single reading passes.
    #[must_use]
    pub fn matches(&self, reading: &Reading, offset: UtcOffset) -> bool {
        if let Some(device) = &self.device
            && reading.device != *device
        {
            return false;
        }
        self.days.contains(reading.timestamp, offset)
    }

    /// Readings of `cache` that pass, in cache order.
    #[must_use]
    pub fn apply(&self, cache: &[Reading], offset: UtcOffset) -> Vec<Reading> {
        cache
            .iter()
            .filter(|r| self.matches(r, offset))
            .cloned()
            .collect()
    }
}

/// Average, minimum and maximum of one metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Aggregate {
    /// Arithmetic mean of the counted values.
    pub avg: f64,
    /// Smallest counted value.
    pub min: f64,
    /// Largest counted value.
    pub max: f64,
    /// Number of values counted.
    pub count: usize,
}

impl Aggregate {
    /// Aggregate of an empty window.
    pub const EMPTY: Aggregate = Aggregate {
        avg: 0.0,
        min: 0.0,
        max: 0.0,
        count: 0,
    };

    /// Whether no value was counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Aggregate `metric` over `readings`, counting only values `> 0`.
#[must_use]
pub fn aggregate(readings: &[Reading], metric: Metric) -> Aggregate {
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut count = 0usize;

    for value in readings.iter().filter_map(|r| r.value(metric)) {
        if value <= 0.0 {
            continue;
        }
        sum += value;
        min = min.min(value);
        max = max.max(value);
        count += 1;
    }

    if count == 0 {
        return Aggregate::EMPTY;
    }

    Aggregate {
        avg: sum / count as f64,
        min,
        max,
        count,
    }
}

/// Aggregate of one metric, labelled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    /// The metric.
    pub metric: Metric,
    /// Its statistics.
    #[serde(flatten)]
    pub aggregate: Aggregate,
}

/// Statistics of every metric over a filtered window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    /// Number of readings in the window.
    pub count: usize,
    /// One entry per metric, in display order.
    pub metrics: Vec<MetricSummary>,
}

impl Summary {
    /// Summarize `readings`.
    #[must_use]
    pub fn from_readings(readings: &[Reading]) -> Self {
        Self {
            count: readings.len(),
            metrics: Metric::ALL
                .iter()
                .map(|&metric| MetricSummary {
                    metric,
                    aggregate: aggregate(readings, metric),
                })
                .collect(),
        }
    }

    /// Statistics of one metric.
    #[must_use]
    pub fn get(&self, metric: Metric) -> Aggregate {
        self.metrics
            .iter()
            .find(|m| m.metric == metric)
            .map(|m| m.aggregate)
            .unwrap_or(Aggregate::EMPTY)
    }
}

/// Sorted, de-duplicated device ids present in the cache.
///
/// Readings with an empty device id are not listed.
#[must_use]
pub fn device_list(cache: &[Reading]) -> Vec<String> {
    sorted_devices(
        cache
            .iter()
            .map(|r| r.device.as_str())
            .filter(|d| !d.is_empty()),
    )
}
