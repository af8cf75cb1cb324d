//! Retrieval of raw records from a [`ReadingSource`].
//!
//! The fetcher flattens the per-device collections into a single list,
//! applies the optional day range, orders the result newest first and
//! truncates it. Transport failures degrade to an empty list; the failure is
//! logged with escalating severity so a store that stays down does not flood
//! the log on every refresh.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use time::{Date, UtcOffset};
use tracing::{debug, error, info, warn};

use aquamon_types::RawRecord;

use crate::error::Result;
use crate::filter::DayRange;
use crate::store::ReadingSource;

/// Number of consecutive failures logged at `warn` before escalating.
const WARN_FAILURES: u32 = 3;

/// Options for a single fetch.
///
/// # Example
///
/// ```
/// use aquamon_core::fetch::FetchOptions;
/// use time::macros::date;
///
/// let options = FetchOptions::new()
///     .device("tank-1")
///     .start_date(date!(2024 - 01 - 01))
///     .limit(500);
/// assert_eq!(options.limit, Some(500));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Keep at most this many (newest) records.
    pub limit: Option<usize>,
    /// Day range the records must fall in.
    pub days: DayRange,
    /// Read a single device instead of the whole tree.
    pub device: Option<String>,
    /// Offset used to derive calendar days from timestamps.
    pub utc_offset: UtcOffset,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            limit: None,
            days: DayRange::default(),
            device: None,
            utc_offset: UtcOffset::UTC,
        }
    }
}

impl FetchOptions {
    /// Fetch everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of records.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
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

    /// Read only one device.
    #[must_use]
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Set the day offset.
    #[must_use]
    pub fn utc_offset(mut self, offset: UtcOffset) -> Self {
        self.utc_offset = offset;
        self
    }
}

/// Reads raw records from a source.
pub struct Fetcher {
    source: Arc<dyn ReadingSource>,
    consecutive_failures: AtomicU32,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field(
                "consecutive_failures",
                &self.consecutive_failures.load(Ordering::Relaxed),
            )
            .finish()
    }
}

impl Fetcher {
    /// Create a fetcher over `source`.
    pub fn new(source: Arc<dyn ReadingSource>) -> Self {
        Self {
            source,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Fetch records, degrading any failure to an empty list.
    pub async fn fetch(&self, options: &FetchOptions) -> Vec<RawRecord> {
        match self.try_fetch(options).await {
            Ok(records) => {
                let previous = self.consecutive_failures.swap(0, Ordering::Relaxed);
                if previous > WARN_FAILURES {
                    info!("Store reachable again after {} failed fetches", previous);
                }
                records
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures <= WARN_FAILURES {
                    warn!("Fetch failed: {} (attempt {})", e, failures);
                } else if failures == WARN_FAILURES + 1 {
                    error!(
                        "Fetch failed {} times in a row, suppressing further warnings: {}",
                        failures, e
                    );
                } else {
                    debug!("Fetch failed: {}", e);
                }
                Vec::new()
            }
        }
    }

    /// Fetch records, returning the error instead of degrading.
    pub async fn try_fetch(&self, options: &FetchOptions) -> Result<Vec<RawRecord>> {
        let mut records = match &options.device {
            Some(device) => self.source.fetch_device(device).await?,
            None => self
                .source
                .fetch_all_devices()
                .await?
                .into_iter()
                .flat_map(|d| d.records)
                .collect(),
        };
        let fetched = records.len();

        if !options.days.is_unbounded() {
            records.retain(|r| options.days.contains(r.timestamp(), options.utc_offset));
        }

        sort_newest_first(&mut records);

        if let Some(limit) = options.limit {
            records.truncate(limit);
        }

        debug!(
            fetched,
            kept = records.len(),
            device = options.device.as_deref().unwrap_or("*"),
            "Fetched raw records"
        );
        Ok(records)
    }

    /// Number of failed fetches since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}

/// Stable sort by timestamp, newest first; records without one sort last.
pub fn sort_newest_first(records: &mut [RawRecord]) {
    records.sort_by_cached_key(|r| std::cmp::Reverse(r.sort_key()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockStore;
    use serde_json::json;
    use time::macros::date;

    fn store() -> Arc<MockStore> {
        Arc::new(
            MockStore::builder()
                .reading("A", json!({"timestamp": "2024-01-01T10:00:00Z", "ph": 1}))
                .reading("A", json!({"timestamp": "2024-01-03T10:00:00Z", "ph": 3}))
                .reading("A", json!({"ph": 0}))
                .reading("B", json!({"timestamp": "2024-01-02T10:00:00Z", "ph": 2}))
                .reading("B", json!({"timestamp": "2024-01-02T09:00:00Z", "ph": 2.5}))
                .build(),
        )
    }

    fn ph(record: &RawRecord) -> f64 {
        record.number("ph").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_all_sorted_newest_first() {
        let fetcher = Fetcher::new(store());
        let records = fetcher.fetch(&FetchOptions::new()).await;
        let values: Vec<f64> = records.iter().map(ph).collect();
        assert_eq!(values, vec![3.0, 2.0, 2.5, 1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_records_tagged_with_device() {
        let fetcher = Fetcher::new(store());
        let records = fetcher.fetch(&FetchOptions::new()).await;
        assert_eq!(records.iter().filter(|r| r.device == "B").count(), 2);
    }

    #[tokio::test]
    async fn test_limit_keeps_newest() {
        let fetcher = Fetcher::new(store());
        let records = fetcher.fetch(&FetchOptions::new().limit(2)).await;
        assert_eq!(records.iter().map(ph).collect::<Vec<_>>(), vec![3.0, 2.0]);
    }

    #[tokio::test]
    async fn test_date_range_is_inclusive_and_drops_untimed() {
        let fetcher = Fetcher::new(store());
        let options = FetchOptions::new()
            .start_date(date!(2024 - 01 - 01))
            .end_date(date!(2024 - 01 - 02));
        let records = fetcher.fetch(&options).await;
        assert_eq!(
            records.iter().map(ph).collect::<Vec<_>>(),
            vec![2.0, 2.5, 1.0]
        );
    }

    #[tokio::test]
    async fn test_single_device() {
        let fetcher = Fetcher::new(store());
        let records = fetcher.fetch(&FetchOptions::new().device("A")).await;
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.device == "A"));
    }

    #[tokio::test]
    async fn test_failure_degrades_to_empty() {
        let store = store();
        store.set_should_fail(true, Some("offline"));
        let fetcher = Fetcher::new(store.clone());

        assert!(fetcher.fetch(&FetchOptions::new()).await.is_empty());
        assert!(fetcher.fetch(&FetchOptions::new()).await.is_empty());
        assert_eq!(fetcher.consecutive_failures(), 2);

        store.set_should_fail(false, None);
        assert_eq!(fetcher.fetch(&FetchOptions::new()).await.len(), 5);
        assert_eq!(fetcher.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_try_fetch_reports_error() {
        let store = store();
        store.set_should_fail(true, None);
        let fetcher = Fetcher::new(store);
        assert!(fetcher.try_fetch(&FetchOptions::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_store() {
        let fetcher = Fetcher::new(Arc::new(MockStore::new()));
        assert!(fetcher.fetch(&FetchOptions::new()).await.is_empty());
    }

    #[test]
    fn test_sort_is_stable_for_equal_timestamps() {
        let mut records: Vec<RawRecord> = (0..4)
            .map(|i| {
                RawRecord::from_value(
                    "A",
                    json!({"timestamp": "2024-01-01T00:00:00Z", "seq": i}),
                )
                .unwrap()
            })
            .collect();
        sort_newest_first(&mut records);
        let seq: Vec<f64> = records.iter().map(|r| r.number("seq").unwrap()).collect();
        assert_eq!(seq, vec![0.0, 1.0, 2.0, 3.0]);
    }
}
