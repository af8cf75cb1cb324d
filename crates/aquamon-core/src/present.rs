//! Views rendered from one filtered, newest-first reading sequence.
//!
//! Each view applies its own truncation:
//!
//! | View | Readings used | Order |
//! |------|---------------|-------|
//! | [`KpiView`] | the first one | - |
//! | [`ChartSeries`] | the first `points` | chronological |
//! | [`TableRow`]s | the first [`TABLE_ROWS`] | newest first |
//! | [`CsvExport`] | those inside an instant range | input order |
//!
//! Empty input produces the "no data" form of every view, never an error.

use serde::Serialize;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use aquamon_types::{Metric, Reading};

use crate::error::Result;

/// Text shown for a missing value or timestamp.
pub const NO_DATA: &str = "--";

/// Rows in the table view.
pub const TABLE_ROWS: usize = 60;

/// Default number of chart points.
pub const DEFAULT_POINT_COUNT: usize = 30;

const CHART_TIME: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]:[second]");
const FULL_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const FILE_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]-[minute]");

/// Render a number with the shortest decimal that round-trips (`500`, `7.25`).
#[must_use]
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        // Also covers negative zero.
        return "0".to_string();
    }
    format!("{value}")
}

/// Render an optional value for text views.
#[must_use]
pub fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| NO_DATA.to_string(), format_number)
}

fn format_time(
    timestamp: Option<OffsetDateTime>,
    offset: UtcOffset,
    format: &[BorrowedFormatItem<'_>],
) -> Option<String> {
    timestamp.and_then(|ts| ts.to_offset(offset).format(format).ok())
}

/// `YYYY-MM-DD HH:MM:SS` at `offset`, or [`NO_DATA`].
#[must_use]
pub fn format_timestamp(timestamp: Option<OffsetDateTime>, offset: UtcOffset) -> String {
    format_time(timestamp, offset, FULL_TIME).unwrap_or_else(|| NO_DATA.to_string())
}

// ==========================================================================
// KPI
// ==========================================================================

/// One headline tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiTile {
    /// Metric shown.
    pub metric: Metric,
    /// Raw value, `None` for no data.
    pub value: Option<f64>,
    /// Rendered value.
    pub text: String,
    /// Unit suffix.
    pub unit: &'static str,
}

/// Headline values of the latest reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiView {
    /// Device of the latest reading, [`NO_DATA`] when empty.
    pub device: String,
    /// Time of the latest reading, [`NO_DATA`] when empty or untimed.
    pub time: String,
    /// One tile per metric, in display order.
    pub tiles: Vec<KpiTile>,
    /// Signal strength, [`NO_DATA`] when unknown.
    pub signal_strength: String,
    /// Signal-to-noise ratio, [`NO_DATA`] when unknown.
    pub signal_noise_ratio: String,
    /// Whether a reading was available.
    pub has_data: bool,
}

impl KpiView {
    /// The "no data" view.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            device: NO_DATA.to_string(),
            time: NO_DATA.to_string(),
            tiles: Metric::ALL
                .iter()
                .map(|&metric| KpiTile {
                    metric,
                    value: None,
                    text: NO_DATA.to_string(),
                    unit: metric.unit(),
                })
                .collect(),
            signal_strength: NO_DATA.to_string(),
            signal_noise_ratio: NO_DATA.to_string(),
            has_data: false,
        }
    }

    /// Build the view from newest-first readings.
    #[must_use]
    pub fn from_readings(readings: &[Reading], offset: UtcOffset) -> Self {
        let Some(latest) = readings.first() else {
            return Self::empty();
        };

        Self {
            device: if latest.device.is_empty() {
                NO_DATA.to_string()
            } else {
                latest.device.clone()
            },
            time: format_timestamp(latest.timestamp, offset),
            tiles: Metric::ALL
                .iter()
                .map(|&metric| {
                    let value = latest.value(metric);
                    KpiTile {
                        metric,
                        value,
                        text: format_value(value),
                        unit: metric.unit(),
                    }
                })
                .collect(),
            signal_strength: latest
                .signal_strength
                .map_or_else(|| NO_DATA.to_string(), |v| v.to_string()),
            signal_noise_ratio: latest
                .signal_noise_ratio
                .map_or_else(|| NO_DATA.to_string(), |v| v.to_string()),
            has_data: true,
        }
    }

    /// Tile of one metric.
    #[must_use]
    pub fn tile(&self, metric: Metric) -> Option<&KpiTile> {
        self.tiles.iter().find(|t| t.metric == metric)
    }
}

// ==========================================================================
// Chart
// ==========================================================================

/// Values of one metric along the chart's time axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    /// Metric plotted.
    pub metric: Metric,
    /// One value per label; `None` leaves a gap.
    pub values: Vec<Option<f64>>,
}

/// Chronological series for the chart widget.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    /// Time-of-day labels, oldest first.
    pub labels: Vec<String>,
    /// One series per metric, parallel to `labels`.
    pub series: Vec<MetricSeries>,
}

impl ChartSeries {
    /// Take the first `points` newest-first readings and lay them out oldest first.
    #[must_use]
    pub fn from_readings(readings: &[Reading], points: usize, offset: UtcOffset) -> Self {
        let window: Vec<&Reading> = readings.iter().take(points).rev().collect();

        let labels = window
            .iter()
            .map(|r| format_time(r.timestamp, offset, CHART_TIME).unwrap_or_else(|| NO_DATA.to_string()))
            .collect();

        let series = Metric::ALL
            .iter()
            .map(|&metric| MetricSeries {
                metric,
                values: window.iter().map(|r| r.value(metric)).collect(),
            })
            .collect();

        Self { labels, series }
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the chart has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Series of one metric.
    #[must_use]
    pub fn get(&self, metric: Metric) -> Option<&MetricSeries> {
        self.series.iter().find(|s| s.metric == metric)
    }
}

// ==========================================================================
// Table
// ==========================================================================

/// One row of the summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    /// `YYYY-MM-DD HH:MM:SS`, or [`NO_DATA`].
    pub time: String,
    /// Device id.
    pub device: String,
    /// Rendered metric values, in display order.
    pub values: Vec<String>,
}

/// Rows for the first [`TABLE_ROWS`] readings, newest first.
#[must_use]
pub fn table_rows(readings: &[Reading], offset: UtcOffset) -> Vec<TableRow> {
    readings
        .iter()
        .take(TABLE_ROWS)
        .map(|r| TableRow {
            time: format_timestamp(r.timestamp, offset),
            device: r.device.clone(),
            values: Metric::ALL.iter().map(|&m| format_value(r.value(m))).collect(),
        })
        .collect()
}

/// Header labels of the table view.
#[must_use]
pub fn table_header() -> Vec<&'static str> {
    let mut header = vec!["Time", "Device"];
    header.extend(Metric::ALL.iter().map(|m| m.label()));
    header
}

// ==========================================================================
// CSV
// ==========================================================================

/// Header row of CSV exports.
#[must_use]
pub fn csv_header() -> Vec<&'static str> {
    let mut header = vec!["Time", "Device"];
    header.extend(Metric::ALL.iter().map(|m| m.csv_header()));
    header
}

/// An export of readings between two instants.
///
/// # Example
///
/// ```
/// use aquamon_core::present::CsvExport;
/// use aquamon_types::{Metric, Reading};
/// use time::UtcOffset;
/// use time::macros::datetime;
///
/// let readings = vec![Reading::new("A")
///     .with_timestamp(Some(datetime!(2024-01-01 0:00 UTC)))
///     .with_value(Metric::Ec, Some(500.0))];
/// let export = CsvExport::new(datetime!(2023-12-31 0:00 UTC), datetime!(2024-01-02 0:00 UTC));
/// let csv = export.render(&readings, UtcOffset::UTC).unwrap();
/// assert!(csv.lines().nth(1).unwrap().starts_with("2024-01-01 00:00:00,A,,500"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    /// First instant included.
    pub start: OffsetDateTime,
    /// Last instant included.
    pub end: OffsetDateTime,
    /// Only this device; `None` exports all devices.
    pub device: Option<String>,
}

impl CsvExport {
    /// Export everything between `start` and `end`, inclusive.
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self {
            start,
            end,
            device: None,
        }
    }

    /// Restrict the export to one device.
    #[must_use]
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Readings selected by the instant range and device.
    ///
    /// Untimed readings are never exported.
    #[must_use]
    pub fn select<'a>(&self, readings: &'a [Reading]) -> Vec<&'a Reading> {
        readings
            .iter()
            .filter(|r| {
                r.timestamp
                    .is_some_and(|ts| ts >= self.start && ts <= self.end)
            })
            .filter(|r| self.device.as_ref().is_none_or(|d| r.device == *d))
            .collect()
    }

    /// Render the CSV document, header included.
    pub fn render(&self, readings: &[Reading], offset: UtcOffset) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(Vec::new());

        writer.write_record(csv_header())?;
        for reading in self.select(readings) {
            let mut record = vec![
                format_time(reading.timestamp, offset, FULL_TIME).unwrap_or_default(),
                reading.device.clone(),
            ];
            record.extend(
                Metric::ALL
                    .iter()
                    .map(|&m| reading.value(m).map(format_number).unwrap_or_default()),
            );
            writer.write_record(&record)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// `water-quality-<device|all>-<start>_to_<end>.csv`.
    #[must_use]
    pub fn file_name(&self, offset: UtcOffset) -> String {
        let device = self
            .device
            .as_deref()
            .map(sanitize_file_component)
            .unwrap_or_else(|| "all".to_string());
        let stamp = |ts: OffsetDateTime| ts.to_offset(offset).format(FILE_TIME).unwrap_or_default();
        format!(
            "water-quality-{}-{}_to_{}.csv",
            device,
            stamp(self.start),
            stamp(self.end)
        )
    }
}

fn sanitize_file_component(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn reading(device: &str, ts: OffsetDateTime, ec: f64) -> Reading {
        Reading::new(device)
            .with_timestamp(Some(ts))
            .with_value(Metric::Ec, Some(ec))
    }

    /// Newest first, one minute apart.
    fn readings(n: usize) -> Vec<Reading> {
        let start = datetime!(2024-01-01 12:00 UTC);
        (0..n)
            .map(|i| reading("A", start - time::Duration::minutes(i as i64), i as f64 + 1.0))
            .collect()
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(500.0), "500");
        assert_eq!(format_number(7.25), "7.25");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(-120.5), "-120.5");
        assert_eq!(format_value(None), NO_DATA);
    }

    #[test]
    fn test_format_timestamp_with_offset() {
        let ts = Some(datetime!(2024-01-01 23:30:00 UTC));
        assert_eq!(format_timestamp(ts, UtcOffset::UTC), "2024-01-01 23:30:00");
        let plus_one = UtcOffset::from_hms(1, 0, 0).unwrap();
        assert_eq!(format_timestamp(ts, plus_one), "2024-01-02 00:30:00");
        assert_eq!(format_timestamp(None, UtcOffset::UTC), NO_DATA);
    }

    // ==========================================================================
    // KPI
    // ==========================================================================

    #[test]
    fn test_kpi_uses_latest_reading() {
        let kpi = KpiView::from_readings(&readings(3), UtcOffset::UTC);
        assert!(kpi.has_data);
        assert_eq!(kpi.device, "A");
        assert_eq!(kpi.time, "2024-01-01 12:00:00");
        assert_eq!(kpi.tile(Metric::Ec).unwrap().text, "1");
        assert_eq!(kpi.tile(Metric::Ph).unwrap().text, NO_DATA);
        assert_eq!(kpi.signal_strength, NO_DATA);
    }

    #[test]
    fn test_kpi_empty() {
        let kpi = KpiView::from_readings(&[], UtcOffset::UTC);
        assert_eq!(kpi, KpiView::empty());
        assert!(!kpi.has_data);
        assert_eq!(kpi.tiles.len(), Metric::ALL.len());
        assert!(kpi.tiles.iter().all(|t| t.text == NO_DATA));
    }

    // ==========================================================================
    // Chart
    // ==========================================================================

    #[test]
    fn test_chart_takes_first_n_and_reverses() {
        let chart = ChartSeries::from_readings(&readings(10), 3, UtcOffset::UTC);
        assert_eq!(chart.len(), 3);
        assert_eq!(chart.labels, vec!["11:58:00", "11:59:00", "12:00:00"]);
        assert_eq!(
            chart.get(Metric::Ec).unwrap().values,
            vec![Some(3.0), Some(2.0), Some(1.0)]
        );
        assert_eq!(chart.series.len(), Metric::ALL.len());
    }

    #[test]
    fn test_chart_with_fewer_readings_than_points() {
        let chart = ChartSeries::from_readings(&readings(2), DEFAULT_POINT_COUNT, UtcOffset::UTC);
        assert_eq!(chart.len(), 2);
    }

    #[test]
    fn test_chart_empty() {
        let chart = ChartSeries::from_readings(&[], 30, UtcOffset::UTC);
        assert!(chart.is_empty());
        assert!(chart.series.iter().all(|s| s.values.is_empty()));
    }

    #[test]
    fn test_chart_untimed_label() {
        let chart = ChartSeries::from_readings(&[Reading::new("A")], 5, UtcOffset::UTC);
        assert_eq!(chart.labels, vec![NO_DATA]);
    }

    // ==========================================================================
    // Table
    // ==========================================================================

    #[test]
    fn test_table_caps_at_sixty_rows_newest_first() {
        let rows = table_rows(&readings(100), UtcOffset::UTC);
        assert_eq!(rows.len(), TABLE_ROWS);
        assert_eq!(rows[0].time, "2024-01-01 12:00:00");
        assert_eq!(rows[1].time, "2024-01-01 11:59:00");
        assert_eq!(rows[0].values.len(), Metric::ALL.len());
        assert_eq!(rows[0].values[Metric::Ec.index()], "1");
    }

    #[test]
    fn test_table_header() {
        assert_eq!(
            table_header(),
            vec!["Time", "Device", "pH", "EC", "DO", "ORP", "Turbidity", "TDS", "Temp"]
        );
    }

    // ==========================================================================
    // CSV
    // ==========================================================================

    #[test]
    fn test_csv_header() {
        assert_eq!(
            csv_header().join(","),
            "Time,Device,pH,EC(µS/cm),DO(mg/L),ORP(mV),Turbidity(NTU),TDS(ppm),Temp(°C)"
        );
    }

    #[test]
    fn test_csv_instant_range_is_inclusive() {
        let export = CsvExport::new(
            datetime!(2024-01-01 11:57 UTC),
            datetime!(2024-01-01 11:59 UTC),
        );
        assert_eq!(export.select(&readings(10)).len(), 3);
    }

    #[test]
    fn test_csv_device_selector() {
        let mut all = readings(3);
        all.push(reading("B", datetime!(2024-01-01 11:00 UTC), 9.0));
        let export = CsvExport::new(
            datetime!(2024-01-01 0:00 UTC),
            datetime!(2024-01-02 0:00 UTC),
        )
        .device("B");
        let selected = export.select(&all);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].device, "B");
    }

    #[test]
    fn test_csv_skips_untimed() {
        let export = CsvExport::new(
            datetime!(1970-01-01 0:00 UTC),
            datetime!(2100-01-01 0:00 UTC),
        );
        assert!(export.select(&[Reading::new("A")]).is_empty());
    }

    #[test]
    fn test_csv_render_quotes_commas() {
        let readings = vec![reading("tank,1 \"north\"", datetime!(2024-01-01 0:00 UTC), 500.0)];
        let export = CsvExport::new(
            datetime!(2024-01-01 0:00 UTC),
            datetime!(2024-01-01 0:00 UTC),
        );
        let csv = export.render(&readings, UtcOffset::UTC).unwrap();
        let line = csv.lines().nth(1).unwrap();
        assert_eq!(line, "2024-01-01 00:00:00,\"tank,1 \"\"north\"\"\",,500,,,,,");
    }

    #[test]
    fn test_csv_render_empty_has_header_only() {
        let export = CsvExport::new(
            datetime!(2024-01-01 0:00 UTC),
            datetime!(2024-01-02 0:00 UTC),
        );
        let csv = export.render(&[], UtcOffset::UTC).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_file_name() {
        let export = CsvExport::new(
            datetime!(2024-01-01 08:05 UTC),
            datetime!(2024-01-31 23:59 UTC),
        );
        assert_eq!(
            export.file_name(UtcOffset::UTC),
            "water-quality-all-2024-01-01T08-05_to_2024-01-31T23-59.csv"
        );
        assert_eq!(
            export.device("tank/1").file_name(UtcOffset::UTC),
            "water-quality-tank_1-2024-01-01T08-05_to_2024-01-31T23-59.csv"
        );
    }
}
