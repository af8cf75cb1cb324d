//! Abstractions over the remote reading store.
//!
//! The store is a tree of `{device -> {readings -> {id -> record}}}`. Two
//! capabilities are used by the pipeline and are modelled as separate traits
//! so that a read-only source (a file dump, a test fixture) does not have to
//! pretend it can push changes:
//!
//! - [`ReadingSource`]: one-shot reads of every device or a single device
//! - [`ChangeFeed`]: a stream of "something changed" notifications
//!
//! Implementations: [`HttpStore`](crate::http::HttpStore) and
//! [`MockStore`](crate::mock::MockStore).

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use aquamon_types::RawRecord;

use crate::error::Result;

/// Name of the per-device collection holding the readings.
pub const READINGS_COLLECTION: &str = "readings";

/// Readings of one device, as returned by [`ReadingSource::fetch_all_devices`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceRecords {
    /// Device id (the key of the device node).
    pub device: String,
    /// Records tagged with `device`.
    pub records: Vec<RawRecord>,
}

/// Notification that the watched subtree changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Whether the subtree holds any data after the change.
    pub exists: bool,
}

/// Stream of change notifications.
///
/// Dropping the stream unsubscribes. The stream ends when the server closes
/// the subscription, and yields an error item when it fails.
pub type ChangeStream = Pin<Box<dyn Stream<Item = Result<ChangeEvent>> + Send>>;

/// One-shot reads from the store.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Read every device and its readings.
    async fn fetch_all_devices(&self) -> Result<Vec<DeviceRecords>>;

    /// Read the readings of a single device. An unknown device yields an empty list.
    async fn fetch_device(&self, device: &str) -> Result<Vec<RawRecord>>;
}

/// Push notifications from the store.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Subscribe to changes of the device tree.
    async fn subscribe(&self) -> Result<ChangeStream>;
}

/// A store supporting both reads and change notifications.
pub trait Store: ReadingSource + ChangeFeed {}

impl<T: ReadingSource + ChangeFeed + ?Sized> Store for T {}

/// Records of one readings collection, tagged with `device`.
///
/// Collections come back either as an object keyed by push id or, when the
/// keys happen to be small integers, as an array with holes. Entries that are
/// not objects are skipped.
#[must_use]
pub fn records_from_collection(device: &str, collection: Value) -> Vec<RawRecord> {
    let entries: Vec<Value> = match collection {
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        Value::Array(items) => items,
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|entry| RawRecord::from_value(device, entry))
        .collect()
}

/// Devices of a whole tree snapshot.
///
/// Each device node is expected to hold a `readings` collection; nodes
/// without one contribute a device with no records.
#[must_use]
pub fn devices_from_tree(tree: Value) -> Vec<DeviceRecords> {
    let Value::Object(devices) = tree else {
        return Vec::new();
    };

    devices
        .into_iter()
        .map(|(device, node)| {
            let records = match node {
                Value::Object(mut fields) => fields
                    .remove(READINGS_COLLECTION)
                    .map(|c| records_from_collection(&device, c))
                    .unwrap_or_default(),
                _ => Vec::new(),
            };
            DeviceRecords { device, records }
        })
        .collect()
}
