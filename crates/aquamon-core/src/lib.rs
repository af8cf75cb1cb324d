//! Data pipeline for water-quality sensor dashboards.
//!
//! This crate turns the contents of a remote reading store into dashboard
//! views and keeps them fresh:
//!
//! ```text
//! ReadingSource ──► Fetcher ──► Normalizer ──► ReadingFilter ──► views
//!      ▲                                                     (KPI, chart,
//!      │                                                  table, summary, CSV)
//! ChangeFeed / timer ──► Orchestrator ──► RefreshEvent
//! ```
//!
//! # Modules
//!
//! - [`validation`]: clamp-and-round of raw numbers into metric ranges
//! - [`store`], [`http`], [`mock`]: the remote store seam and its implementations
//! - [`fetch`]: flatten, date-filter, sort and truncate raw records
//! - [`normalize`]: raw records to [`Reading`]s, with a pluggable fallback policy
//! - [`filter`]: device/day filtering, aggregation, device list
//! - [`present`]: KPI, chart, table and CSV views
//! - [`pipeline`]: one fetch-to-views run
//! - [`orchestrator`], [`events`]: polling or push-driven refresh
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use aquamon_core::{FilterState, MockStore, Pipeline};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(
//!         MockStore::builder()
//!             .reading("tank-1", json!({"timestamp": "2024-01-01T08:00:00Z", "ec_uS_cm": 450}))
//!             .build(),
//!     );
//!     let snapshot = Pipeline::new(store).run_once(&FilterState::default()).await;
//!     assert_eq!(snapshot.devices, vec!["tank-1"]);
//!     assert!(snapshot.kpi.has_data);
//! }
//! ```

pub mod error;
pub mod events;
pub mod fetch;
pub mod filter;
pub mod http;
pub mod mock;
pub mod normalize;
pub mod orchestrator;
pub mod pipeline;
pub mod present;
pub mod store;
pub mod validation;

pub use error::{Error, Result};
pub use events::{EventDispatcher, EventReceiver, RefreshEvent, RefreshMode, Trigger};
pub use fetch::{FetchOptions, Fetcher};
pub use filter::{Aggregate, DayRange, ReadingFilter, Summary, aggregate, device_list};
pub use http::{HttpStore, HttpStoreOptions};
pub use mock::MockStore;
pub use normalize::{DemoFallback, FallbackPolicy, LIVE_METRICS, NoFallback, Normalizer};
pub use orchestrator::{Orchestrator, OrchestratorHandle, OrchestratorOptions, Session};
pub use pipeline::{DashboardSnapshot, FilterState, Pipeline};
pub use present::{ChartSeries, CsvExport, KpiView, TableRow, table_rows};
pub use store::{ChangeEvent, ChangeFeed, ChangeStream, DeviceRecords, ReadingSource, Store};
pub use validation::validate;

// Re-export types
pub use aquamon_types::{Metric, MetricRange, RawRecord, Reading};
