//! In-memory store for testing.
//!
//! [`MockStore`] implements both [`ReadingSource`] and [`ChangeFeed`] so the
//! fetcher and the refresh orchestrator can be exercised without a network.
//!
//! # Features
//!
//! - **Failure injection**: fail every read, or only the next N reads
//! - **Latency simulation**: delay reads, either uniformly or per call
//! - **Change triggering**: push change notifications to subscribers on demand

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};

use aquamon_types::RawRecord;

use crate::error::{Error, Result};
use crate::store::{ChangeEvent, ChangeFeed, ChangeStream, DeviceRecords, ReadingSource};

/// An in-memory reading store.
///
/// # Example
///
/// ```
/// use aquamon_core::mock::MockStore;
/// use aquamon_core::store::ReadingSource;
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() {
///     let store = MockStore::builder()
///         .reading("tank-1", json!({"timestamp": "2024-01-01T00:00:00Z", "ec_uS_cm": 450}))
///         .build();
///
///     let devices = store.fetch_all_devices().await.unwrap();
///     assert_eq!(devices.len(), 1);
/// }
/// ```
pub struct MockStore {
    devices: RwLock<BTreeMap<String, Vec<Value>>>,
    should_fail: AtomicBool,
    subscribe_fails: AtomicBool,
    fail_message: Mutex<String>,
    remaining_failures: AtomicU32,
    read_count: AtomicU32,
    /// Uniform read latency in milliseconds (0 = no delay).
    read_latency_ms: AtomicU64,
    /// Per-call latencies, consumed before the uniform one applies.
    scheduled_latencies: Mutex<VecDeque<Duration>>,
    changes: Mutex<Option<broadcast::Sender<ChangeEvent>>>,
}

impl std::fmt::Debug for MockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("should_fail", &self.should_fail.load(Ordering::Relaxed))
            .field("read_count", &self.read_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            devices: RwLock::new(BTreeMap::new()),
            should_fail: AtomicBool::new(false),
            subscribe_fails: AtomicBool::new(false),
            fail_message: Mutex::new("Mock failure".to_string()),
            remaining_failures: AtomicU32::new(0),
            read_count: AtomicU32::new(0),
            read_latency_ms: AtomicU64::new(0),
            scheduled_latencies: Mutex::new(VecDeque::new()),
            changes: Mutex::new(Some(tx)),
        }
    }

    /// Create a builder.
    pub fn builder() -> MockStoreBuilder {
        MockStoreBuilder::default()
    }

    // --- Test control methods ---

    /// Append a raw record under a device.
    pub async fn insert(&self, device: &str, record: Value) {
        self.devices
            .write()
            .await
            .entry(device.to_string())
            .or_default()
            .push(record);
    }

    /// Remove every device.
    pub async fn clear(&self) {
        self.devices.write().await.clear();
    }

    /// Make every read fail (or succeed again).
    pub fn set_should_fail(&self, fail: bool, message: Option<&str>) {
        self.should_fail.store(fail, Ordering::Relaxed);
        if let Some(msg) = message
            && let Ok(mut guard) = self.fail_message.lock()
        {
            *guard = msg.to_string();
        }
    }

    /// Make subscription attempts fail.
    pub fn set_subscribe_fails(&self, fail: bool) {
        self.subscribe_fails.store(fail, Ordering::Relaxed);
    }

    /// Fail the next `count` reads, then succeed.
    pub fn set_transient_failures(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    /// Delay every read by `latency`.
    pub fn set_read_latency(&self, latency: Duration) {
        self.read_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Delay the next read by `latency`; queued delays are consumed in order.
    pub fn push_latency(&self, latency: Duration) {
        if let Ok(mut queue) = self.scheduled_latencies.lock() {
            queue.push_back(latency);
        }
    }

    /// Number of reads performed.
    pub fn read_count(&self) -> u32 {
        self.read_count.load(Ordering::Relaxed)
    }

    /// Notify every subscriber that the tree changed.
    ///
    /// Returns the number of subscribers reached.
    pub async fn trigger_change(&self) -> usize {
        let exists = !self.devices.read().await.is_empty();
        self.sender()
            .and_then(|tx| tx.send(ChangeEvent { exists }).ok())
            .unwrap_or(0)
    }

    /// End every open subscription, as if the server dropped the connection.
    ///
    /// Later subscriptions fail until [`MockStore::reopen_feed`] is called.
    pub fn close_feed(&self) {
        if let Ok(mut guard) = self.changes.lock() {
            guard.take();
        }
    }

    /// Accept subscriptions again after [`MockStore::close_feed`].
    pub fn reopen_feed(&self) {
        if let Ok(mut guard) = self.changes.lock()
            && guard.is_none()
        {
            let (tx, _) = broadcast::channel(64);
            *guard = Some(tx);
        }
    }

    fn sender(&self) -> Option<broadcast::Sender<ChangeEvent>> {
        self.changes.lock().ok().and_then(|guard| guard.clone())
    }

    fn fail_error(&self) -> Error {
        let message = self
            .fail_message
            .lock()
            .map(|m| m.clone())
            .unwrap_or_else(|_| "Mock failure".to_string());
        Error::Unavailable(message)
    }

    async fn before_read(&self) -> Result<()> {
        self.read_count.fetch_add(1, Ordering::Relaxed);

        let scheduled = self
            .scheduled_latencies
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        let latency = scheduled.unwrap_or_else(|| {
            Duration::from_millis(self.read_latency_ms.load(Ordering::Relaxed))
        });
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        // Check for transient failures first
        if self.remaining_failures.load(Ordering::Relaxed) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(self.fail_error());
        }

        if self.should_fail.load(Ordering::Relaxed) {
            Err(self.fail_error())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ReadingSource for MockStore {
    async fn fetch_all_devices(&self) -> Result<Vec<DeviceRecords>> {
        self.before_read().await?;
        let devices = self.devices.read().await;
        Ok(devices
            .iter()
            .map(|(device, records)| DeviceRecords {
                device: device.clone(),
                records: records
                    .iter()
                    .filter_map(|r| RawRecord::from_value(device.as_str(), r.clone()))
                    .collect(),
            })
            .collect())
    }

    async fn fetch_device(&self, device: &str) -> Result<Vec<RawRecord>> {
        self.before_read().await?;
        let devices = self.devices.read().await;
        Ok(devices
            .get(device)
            .map(|records| {
                records
                    .iter()
                    .filter_map(|r| RawRecord::from_value(device, r.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl ChangeFeed for MockStore {
    async fn subscribe(&self) -> Result<ChangeStream> {
        if self.subscribe_fails.load(Ordering::Relaxed) {
            return Err(Error::Subscription("mock subscription refused".to_string()));
        }
        let rx = self
            .sender()
            .ok_or_else(|| Error::Unavailable("change feed closed".to_string()))?
            .subscribe();

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((Ok::<_, Error>(event), rx)),
                    // Missed notifications collapse into the next one.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

/// Builder for [`MockStore`].
#[derive(Debug, Default)]
pub struct MockStoreBuilder {
    devices: BTreeMap<String, Vec<Value>>,
    should_fail: bool,
    subscribe_fails: bool,
    read_latency: Duration,
}

impl MockStoreBuilder {
    /// Add one raw record under a device.
    #[must_use]
    pub fn reading(mut self, device: &str, record: Value) -> Self {
        self.devices
            .entry(device.to_string())
            .or_default()
            .push(record);
        self
    }

    /// Add many raw records under a device.
    #[must_use]
    pub fn readings(mut self, device: &str, records: impl IntoIterator<Item = Value>) -> Self {
        self.devices
            .entry(device.to_string())
            .or_default()
            .extend(records);
        self
    }

    /// Start with every read failing.
    #[must_use]
    pub fn should_fail(mut self, fail: bool) -> Self {
        self.should_fail = fail;
        self
    }

    /// Start with subscriptions refused.
    #[must_use]
    pub fn subscribe_fails(mut self, fail: bool) -> Self {
        self.subscribe_fails = fail;
        self
    }

    /// Delay every read.
    #[must_use]
    pub fn read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = latency;
        self
    }

    /// Build the store.
    pub fn build(self) -> MockStore {
        let mut store = MockStore::new();
        store.should_fail.store(self.should_fail, Ordering::Relaxed);
        store
            .subscribe_fails
            .store(self.subscribe_fails, Ordering::Relaxed);
        store.set_read_latency(self.read_latency);
        *store.devices.get_mut() = self.devices;
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_builder_and_fetch() {
        let store = MockStore::builder()
            .reading("tank-1", json!({"ph": 7}))
            .reading("tank-1", json!({"ph": 8}))
            .reading("tank-2", json!({"ph": 6}))
            .build();

        let devices = store.fetch_all_devices().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].records.len(), 2);
        assert_eq!(devices[0].records[0].device, "tank-1");

        let tank2 = store.fetch_device("tank-2").await.unwrap();
        assert_eq!(tank2.len(), 1);
        assert!(store.fetch_device("missing").await.unwrap().is_empty());
        assert_eq!(store.read_count(), 3);
    }

    #[tokio::test]
    async fn test_non_object_records_are_skipped() {
        let store = MockStore::builder()
            .readings("A", [json!({"ph": 7}), json!("junk"), json!(null)])
            .build();
        assert_eq!(store.fetch_device("A").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_should_fail() {
        let store = MockStore::builder().should_fail(true).build();
        let err = store.fetch_all_devices().await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));

        store.set_should_fail(false, None);
        assert!(store.fetch_all_devices().await.is_ok());
    }

    #[tokio::test]
    async fn test_transient_failures() {
        let store = MockStore::new();
        store.set_transient_failures(2);
        assert!(store.fetch_all_devices().await.is_err());
        assert!(store.fetch_all_devices().await.is_err());
        assert!(store.fetch_all_devices().await.is_ok());
    }

    #[tokio::test]
    async fn test_custom_fail_message() {
        let store = MockStore::new();
        store.set_should_fail(true, Some("offline"));
        let err = store.fetch_device("A").await.unwrap_err();
        assert_eq!(err.to_string(), "Store unavailable: offline");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_latency() {
        let store = MockStore::new();
        store.push_latency(Duration::from_secs(5));

        let start = tokio::time::Instant::now();
        store.fetch_all_devices().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));

        let start = tokio::time::Instant::now();
        store.fetch_all_devices().await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_subscribe_and_trigger() {
        let store = MockStore::builder().reading("A", json!({"ph": 7})).build();
        let mut feed = store.subscribe().await.unwrap();

        assert_eq!(store.trigger_change().await, 1);
        let event = feed.next().await.unwrap().unwrap();
        assert!(event.exists);

        store.clear().await;
        store.trigger_change().await;
        let event = feed.next().await.unwrap().unwrap();
        assert!(!event.exists);
    }

    #[tokio::test]
    async fn test_close_feed_ends_stream() {
        let store = MockStore::new();
        let mut feed = store.subscribe().await.unwrap();
        store.close_feed();
        assert!(feed.next().await.is_none());
        assert!(store.subscribe().await.is_err());

        store.reopen_feed();
        assert!(store.subscribe().await.is_ok());
    }

    #[tokio::test]
    async fn test_subscribe_fails() {
        let store = MockStore::builder().subscribe_fails(true).build();
        assert!(matches!(
            store.subscribe().await,
            Err(Error::Subscription(_))
        ));
    }
}
