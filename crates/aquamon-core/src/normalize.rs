//! Mapping of raw records into canonical [`Reading`]s.
//!
//! Metrics fall into two groups:
//!
//! - **live** metrics ([`LIVE_METRICS`]) are read from the record, validated,
//!   and handed to the [`FallbackPolicy`] when absent or exactly zero
//! - every other metric is forced to [`PLACEHOLDER_VALUE`] whatever the raw
//!   record holds, since no deployed sensor reports it
//!
//! Enabling another sensor is a matter of adding its metric to
//! [`LIVE_METRICS`].

use std::fmt::Debug;
use std::ops::RangeInclusive;
use std::sync::Arc;

use rand::Rng;

use aquamon_types::types::{SIGNAL_NOISE_KEYS, SIGNAL_STRENGTH_KEYS};
use aquamon_types::{Metric, RawRecord, Reading};

use crate::validation::{round2, validate_metric};

/// Metrics backed by a deployed sensor.
pub const LIVE_METRICS: &[Metric] = &[Metric::Ec, Metric::Tds];

/// Value of every metric without a deployed sensor.
pub const PLACEHOLDER_VALUE: f64 = 0.0;

/// Decides what a live metric shows when its raw value is absent or zero.
pub trait FallbackPolicy: Send + Sync + Debug {
    /// Replacement value for `metric`, or `None` to keep the validated value.
    fn fallback(&self, metric: Metric) -> Option<f64>;

    /// Short name for logs and config output.
    fn name(&self) -> &'static str;
}

/// Draws demo values uniformly from a fixed range per metric.
///
/// Only conductivity (300..=800 µS/cm) and dissolved solids (150..=400 ppm)
/// have a demo range. Values are rounded to two decimals.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoFallback;

impl DemoFallback {
    /// Demo range of `metric`, if it has one.
    #[must_use]
    pub fn range(metric: Metric) -> Option<RangeInclusive<f64>> {
        match metric {
            Metric::Ec => Some(300.0..=800.0),
            Metric::Tds => Some(150.0..=400.0),
            _ => None,
        }
    }
}

impl FallbackPolicy for DemoFallback {
    fn fallback(&self, metric: Metric) -> Option<f64> {
        let range = Self::range(metric)?;
        Some(round2(rand::rng().random_range(range)))
    }

    fn name(&self) -> &'static str {
        "demo"
    }
}

/// Keeps absent values absent and zero values zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

impl FallbackPolicy for NoFallback {
    fn fallback(&self, _metric: Metric) -> Option<f64> {
        None
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Turns [`RawRecord`]s into [`Reading`]s.
///
/// # Example
///
/// ```
/// use aquamon_core::normalize::Normalizer;
/// use aquamon_types::{Metric, RawRecord};
/// use serde_json::json;
///
/// let raw = RawRecord::from_value("tank-1", json!({"ec_uS_cm": 450, "ph": 7.2})).unwrap();
/// let reading = Normalizer::default().normalize(&raw);
/// assert_eq!(reading.value(Metric::Ec), Some(450.0));
/// assert_eq!(reading.value(Metric::Ph), Some(0.0));
/// ```
#[derive(Debug, Clone)]
pub struct Normalizer {
    policy: Arc<dyn FallbackPolicy>,
    live: Vec<Metric>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Arc::new(DemoFallback))
    }
}

impl Normalizer {
    /// Create a normalizer with the given fallback policy.
    pub fn new(policy: Arc<dyn FallbackPolicy>) -> Self {
        Self {
            policy,
            live: LIVE_METRICS.to_vec(),
        }
    }

    /// Create a normalizer that never substitutes values.
    pub fn without_fallback() -> Self {
        Self::new(Arc::new(NoFallback))
    }

    /// Override the set of live metrics.
    #[must_use]
    pub fn with_live_metrics(mut self, metrics: impl IntoIterator<Item = Metric>) -> Self {
        self.live = metrics.into_iter().collect();
        self
    }

    /// The active fallback policy.
    pub fn policy(&self) -> &dyn FallbackPolicy {
        self.policy.as_ref()
    }

    /// Whether `metric` is read from the record.
    #[must_use]
    pub fn is_live(&self, metric: Metric) -> bool {
        self.live.contains(&metric)
    }

    /// Normalize one record.
    #[must_use]
    pub fn normalize(&self, raw: &RawRecord) -> Reading {
        let device = if raw.device.is_empty() {
            raw.embedded_device().unwrap_or_default()
        } else {
            raw.device.as_str()
        };

        let mut reading = Reading::new(device)
            .with_timestamp(raw.timestamp())
            .with_signal(
                raw.integer(SIGNAL_STRENGTH_KEYS),
                raw.integer(SIGNAL_NOISE_KEYS),
            );

        for metric in Metric::ALL {
            let value = if self.is_live(metric) {
                self.live_value(raw, metric)
            } else {
                Some(PLACEHOLDER_VALUE)
            };
            reading = reading.with_value(metric, value);
        }

        reading
    }

    /// Normalize a batch, keeping its order.
    #[must_use]
    pub fn normalize_all(&self, records: &[RawRecord]) -> Vec<Reading> {
        records.iter().map(|r| self.normalize(r)).collect()
    }

    fn live_value(&self, raw: &RawRecord, metric: Metric) -> Option<f64> {
        let validated = validate_metric(raw.number(metric.raw_key()), metric);
        match validated {
            Some(v) if v != PLACEHOLDER_VALUE => validated,
            _ => self.policy.fallback(metric).or(validated),
        }
    }
}
