//! One pipeline run: fetch, normalize, filter, present.
//!
//! [`Pipeline::load`] performs the I/O half and produces the reading cache;
//! [`DashboardSnapshot::render`] is the pure half that turns a cache and the
//! current filter controls into every view.

use std::sync::Arc;

use serde::Serialize;
use time::{Date, UtcOffset};
use tracing::debug;

use aquamon_types::Reading;

use crate::fetch::{FetchOptions, Fetcher};
use crate::filter::{DayRange, ReadingFilter, Summary, device_list};
use crate::normalize::Normalizer;
use crate::present::{ChartSeries, DEFAULT_POINT_COUNT, KpiView, TableRow, table_rows};
use crate::store::ReadingSource;

/// Values of the filter controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterState {
    /// Selected device, `None` for all.
    pub device: Option<String>,
    /// Selected day range.
    pub days: DayRange,
    /// Number of chart points.
    pub point_count: usize,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            device: None,
            days: DayRange::default(),
            point_count: DEFAULT_POINT_COUNT,
        }
    }
}

impl FilterState {
    /// Select a device.
    #[must_use]
    pub fn with_device(mut self, device: Option<String>) -> Self {
        self.device = device;
        self
    }

    /// Select a day range.
    #[must_use]
    pub fn with_days(mut self, start: Option<Date>, end: Option<Date>) -> Self {
        self.days = DayRange::new(start, end);
        self
    }

    /// Set the number of chart points.
    #[must_use]
    pub fn with_point_count(mut self, point_count: usize) -> Self {
        self.point_count = point_count;
        self
    }

    /// The cache filter these controls describe.
    #[must_use]
    pub fn reading_filter(&self) -> ReadingFilter {
        ReadingFilter {
            device: self.device.clone(),
            days: self.days,
        }
    }
}

/// Everything a front end needs to draw the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    /// Devices present in the cache, sorted.
    pub devices: Vec<String>,
    /// Filter controls the views were rendered with.
    pub filters: FilterState,
    /// Readings in the cache before filtering.
    pub cache_size: usize,
    /// Readings left after filtering.
    pub filtered_count: usize,
    /// Headline tiles.
    pub kpi: KpiView,
    /// Chart series.
    pub chart: ChartSeries,
    /// Table rows.
    pub table: Vec<TableRow>,
    /// Per-metric statistics of the filtered window.
    pub summary: Summary,
}

impl DashboardSnapshot {
    /// Render every view from a newest-first cache.
    #[must_use]
    pub fn render(cache: &[Reading], filters: &FilterState, offset: UtcOffset) -> Self {
        let filtered = filters.reading_filter().apply(cache, offset);

        Self {
            devices: device_list(cache),
            filters: filters.clone(),
            cache_size: cache.len(),
            filtered_count: filtered.len(),
            kpi: KpiView::from_readings(&filtered, offset),
            chart: ChartSeries::from_readings(&filtered, filters.point_count, offset),
            table: table_rows(&filtered, offset),
            summary: Summary::from_readings(&filtered),
        }
    }
}

/// Fetcher and normalizer wired together.
#[derive(Debug)]
pub struct Pipeline {
    fetcher: Fetcher,
    normalizer: Normalizer,
    fetch_limit: Option<usize>,
    utc_offset: UtcOffset,
}

impl Pipeline {
    /// Create a pipeline reading from `source` with the demo fallback policy.
    pub fn new(source: Arc<dyn ReadingSource>) -> Self {
        Self {
            fetcher: Fetcher::new(source),
            normalizer: Normalizer::default(),
            fetch_limit: None,
            utc_offset: UtcOffset::UTC,
        }
    }

    /// Replace the normalizer.
    #[must_use]
    pub fn normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Keep at most `limit` readings per run.
    #[must_use]
    pub fn fetch_limit(mut self, limit: Option<usize>) -> Self {
        self.fetch_limit = limit;
        self
    }

    /// Offset used for calendar days and labels.
    #[must_use]
    pub fn utc_offset(mut self, offset: UtcOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// The configured offset.
    pub fn offset(&self) -> UtcOffset {
        self.utc_offset
    }

    /// Fetch every device and normalize the result into a newest-first cache.
    ///
    /// Transport failures yield an empty cache.
    pub async fn load(&self) -> Vec<Reading> {
        let mut options = FetchOptions::new().utc_offset(self.utc_offset);
        options.limit = self.fetch_limit;
        self.load_with(&options).await
    }

    /// Fetch with explicit options and normalize.
    pub async fn load_with(&self, options: &FetchOptions) -> Vec<Reading> {
        let raw = self.fetcher.fetch(options).await;
        let readings = self.normalizer.normalize_all(&raw);
        debug!(readings = readings.len(), "Normalized readings");
        readings
    }

    /// Render the views for `cache`.
    #[must_use]
    pub fn render(&self, cache: &[Reading], filters: &FilterState) -> DashboardSnapshot {
        DashboardSnapshot::render(cache, filters, self.utc_offset)
    }

    /// Load and render in one go.
    pub async fn run_once(&self, filters: &FilterState) -> DashboardSnapshot {
        let cache = self.load().await;
        self.render(&cache, filters)
    }
}
