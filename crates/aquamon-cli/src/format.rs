//! Output formatting for text and JSON.

use anyhow::Result;
use serde::Serialize;
use tabled::builder::Builder;

use aquamon_core::present::{NO_DATA, format_number, table_header};
use aquamon_core::validation::round2;
use aquamon_core::{ChartSeries, DashboardSnapshot, KpiView, RefreshMode, Summary, TableRow};
use aquamon_types::Metric;

use crate::style;

/// Rows of the table shown by `watch`.
pub const WATCH_TABLE_ROWS: usize = 10;

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Use compact JSON output (no pretty-printing).
    pub compact: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool) -> Self {
        Self {
            no_color,
            compact: false,
        }
    }

    /// Create with compact JSON option.
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Serialize value to JSON string, respecting compact option.
    pub fn as_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json + "\n")
    }
}

/// Render an aggregate value: two decimals, `--` when nothing was counted.
fn format_stat(value: f64, count: usize) -> String {
    if count == 0 {
        NO_DATA.to_string()
    } else {
        format_number(round2(value))
    }
}

fn with_unit(metric: Metric, text: &str) -> String {
    if metric.unit().is_empty() || text == NO_DATA {
        text.to_string()
    } else {
        format!("{} {}", text, metric.unit())
    }
}

// ============================================================================
// KPI
// ============================================================================

/// Headline tiles of the latest reading, with optional trend arrows.
#[must_use]
pub fn format_kpi_text(kpi: &KpiView, previous: Option<&KpiView>, opts: &FormatOptions) -> String {
    let mut output = format!(
        "Device: {}   Time: {}   Signal: {} / SNR {}\n",
        kpi.device, kpi.time, kpi.signal_strength, kpi.signal_noise_ratio
    );

    let mut builder = Builder::default();
    builder.push_record(kpi.tiles.iter().map(|t| t.metric.label().to_string()));
    builder.push_record(kpi.tiles.iter().map(|tile| {
        let prev = previous.and_then(|p| p.tile(tile.metric)).and_then(|t| t.value);
        let text = style::format_metric_colored(
            tile.metric,
            tile.value,
            &with_unit(tile.metric, &tile.text),
            opts.no_color,
        );
        match previous {
            Some(_) => format!("{} {}", text, style::trend_indicator(tile.value, prev, opts.no_color)),
            None => text,
        }
    }));

    let mut table = builder.build();
    style::apply_table_style(&mut table, opts.no_color);
    output.push_str(&table.to_string());
    output.push('\n');
    output
}

// ============================================================================
// Table
// ============================================================================

/// Reading table, newest first, at most `max_rows` rows.
#[must_use]
pub fn format_table_text(rows: &[TableRow], max_rows: usize, opts: &FormatOptions) -> String {
    if rows.is_empty() {
        return "No readings in the selected window.\n".to_string();
    }

    let mut builder = Builder::default();
    builder.push_record(table_header());
    for row in rows.iter().take(max_rows) {
        let mut record = vec![row.time.clone(), row.device.clone()];
        record.extend(row.values.iter().cloned());
        builder.push_record(record);
    }

    let mut table = builder.build();
    style::apply_table_style(&mut table, opts.no_color);
    let mut output = table.to_string();
    output.push('\n');

    if rows.len() > max_rows {
        output.push_str(&format!("... and {} more rows\n", rows.len() - max_rows));
    }
    output
}

// ============================================================================
// Chart
// ============================================================================

/// One sparkline per metric that has any data.
#[must_use]
pub fn format_chart_text(chart: &ChartSeries, opts: &FormatOptions) -> String {
    if chart.is_empty() {
        return String::new();
    }

    let mut output = String::new();
    for series in &chart.series {
        if series.values.iter().flatten().all(|v| *v == 0.0) {
            continue;
        }
        output.push_str(&format!(
            "{:<10} {}\n",
            series.metric.label(),
            style::sparkline(&series.values, opts.no_color)
        ));
    }
    if let (Some(first), Some(last)) = (chart.labels.first(), chart.labels.last()) {
        output.push_str(&format!("{:<10} {} .. {}\n", "", first, last));
    }
    output
}

/// Chart series as JSON.
pub fn format_chart_json(chart: &ChartSeries, opts: &FormatOptions) -> Result<String> {
    opts.as_json(chart)
}

// ============================================================================
// Summary
// ============================================================================

/// Per-metric statistics as a table.
#[must_use]
pub fn format_summary_text(summary: &Summary, opts: &FormatOptions) -> String {
    let mut output = format!("Summary ({} readings):\n\n", summary.count);

    let mut builder = Builder::default();
    builder.push_record(["Metric", "Avg", "Min", "Max", "Count"]);
    for entry in &summary.metrics {
        let agg = entry.aggregate;
        builder.push_record([
            with_unit(entry.metric, entry.metric.label()),
            format_stat(agg.avg, agg.count),
            format_stat(agg.min, agg.count),
            format_stat(agg.max, agg.count),
            agg.count.to_string(),
        ]);
    }

    let mut table = builder.build();
    style::apply_table_style(&mut table, opts.no_color);
    output.push_str(&table.to_string());
    output.push('\n');
    output
}

/// Per-metric statistics as JSON.
pub fn format_summary_json(summary: &Summary, opts: &FormatOptions) -> Result<String> {
    opts.as_json(summary)
}

// ============================================================================
// Devices
// ============================================================================

/// One device per line.
#[must_use]
pub fn format_devices_text(devices: &[String], opts: &FormatOptions) -> String {
    if devices.is_empty() {
        return style::format_info("No devices found.", opts.no_color) + "\n";
    }
    let mut output = format!("Devices ({}):\n", devices.len());
    for device in devices {
        output.push_str(&format!("  {}\n", device));
    }
    output
}

/// Device list as a JSON array.
pub fn format_devices_json(devices: &[String], opts: &FormatOptions) -> Result<String> {
    opts.as_json(&devices)
}

// ============================================================================
// Dashboard
// ============================================================================

/// Full dashboard frame printed by `watch`.
#[must_use]
pub fn format_dashboard(
    snapshot: &DashboardSnapshot,
    previous: Option<&KpiView>,
    mode: RefreshMode,
    opts: &FormatOptions,
) -> String {
    let device = snapshot.filters.device.as_deref().unwrap_or("all devices");
    let title = format!(
        "aquamon: {} ({} mode, {} of {} readings)",
        device, mode, snapshot.filtered_count, snapshot.cache_size
    );

    let mut output = style::format_title(&title, opts.no_color);
    output.push_str("\n\n");
    output.push_str(&format_kpi_text(&snapshot.kpi, previous, opts));

    let chart = format_chart_text(&snapshot.chart, opts);
    if !chart.is_empty() {
        output.push('\n');
        output.push_str(&chart);
    }

    output.push('\n');
    output.push_str(&format_table_text(&snapshot.table, WATCH_TABLE_ROWS, opts));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquamon_core::FilterState;
    use aquamon_types::Reading;
    use time::UtcOffset;
    use time::macros::datetime;

    fn opts() -> FormatOptions {
        FormatOptions::new(true)
    }

    fn cache() -> Vec<Reading> {
        vec![
            Reading::new("tank-1")
                .with_timestamp(Some(datetime!(2024-01-01 10:01 UTC)))
                .with_value(Metric::Ec, Some(455.5))
                .with_value(Metric::Ph, Some(0.0))
                .with_signal(Some(-61), Some(12)),
            Reading::new("tank-1")
                .with_timestamp(Some(datetime!(2024-01-01 10:00 UTC)))
                .with_value(Metric::Ec, Some(450.0)),
        ]
    }

    fn snapshot() -> DashboardSnapshot {
        DashboardSnapshot::render(&cache(), &FilterState::default(), UtcOffset::UTC)
    }

    // ========================================================================
    // KPI tests
    // ========================================================================

    #[test]
    fn test_kpi_text_contains_values_and_units() {
        let text = format_kpi_text(&snapshot().kpi, None, &opts());
        assert!(text.contains("Device: tank-1"));
        assert!(text.contains("Time: 2024-01-01 10:01:00"));
        assert!(text.contains("Signal: -61 / SNR 12"));
        assert!(text.contains("455.5 µS/cm"));
        assert!(text.contains("TDS"));
    }

    #[test]
    fn test_kpi_text_trend() {
        let older = DashboardSnapshot::render(&cache()[1..], &FilterState::default(), UtcOffset::UTC);
        let text = format_kpi_text(&snapshot().kpi, Some(&older.kpi), &opts());
        assert!(text.contains("455.5 µS/cm ^"));
    }

    #[test]
    fn test_kpi_text_empty_window() {
        let text = format_kpi_text(&KpiView::empty(), None, &opts());
        assert!(text.contains("Device: --"));
        assert!(!text.contains("µS/cm"));
    }

    // ========================================================================
    // Table and chart tests
    // ========================================================================

    #[test]
    fn test_table_text_truncates() {
        let snapshot = snapshot();
        let text = format_table_text(&snapshot.table, 1, &opts());
        assert!(text.contains("2024-01-01 10:01:00"));
        assert!(!text.contains("2024-01-01 10:00:00"));
        assert!(text.contains("... and 1 more rows"));
    }

    #[test]
    fn test_table_text_empty() {
        assert_eq!(
            format_table_text(&[], 10, &opts()),
            "No readings in the selected window.\n"
        );
    }

    #[test]
    fn test_chart_text_skips_placeholder_series() {
        let text = format_chart_text(&snapshot().chart, &opts());
        assert!(text.contains("EC"));
        assert!(!text.contains("pH"));
        assert!(text.contains("10:00:00 .. 10:01:00"));
    }

    #[test]
    fn test_chart_json() {
        let json = format_chart_json(&snapshot().chart, &opts().with_compact(true)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["labels"][0], "10:00:00");
    }

    // ========================================================================
    // Summary tests
    // ========================================================================

    #[test]
    fn test_summary_text() {
        let text = format_summary_text(&snapshot().summary, &opts());
        assert!(text.contains("Summary (2 readings)"));
        assert!(text.contains("452.75"));
        assert!(text.contains("455.5"));
        assert!(text.contains("--"));
    }

    #[test]
    fn test_summary_json() {
        let json = format_summary_json(&snapshot().summary, &opts()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["count"], 2);
        assert_eq!(value["metrics"][1]["max"], 455.5);
    }

    #[test]
    fn test_format_stat() {
        assert_eq!(format_stat(452.749, 3), "452.75");
        assert_eq!(format_stat(0.0, 0), NO_DATA);
    }

    // ========================================================================
    // Device and dashboard tests
    // ========================================================================

    #[test]
    fn test_devices_text() {
        let devices = vec!["tank-2".to_string(), "tank-10".to_string()];
        let text = format_devices_text(&devices, &opts());
        assert_eq!(text, "Devices (2):\n  tank-2\n  tank-10\n");
        assert!(format_devices_text(&[], &opts()).contains("No devices found"));
    }

    #[test]
    fn test_dashboard_frame() {
        let text = format_dashboard(&snapshot(), None, RefreshMode::Polling, &opts());
        assert!(text.starts_with("aquamon: all devices (polling mode, 2 of 2 readings)"));
        assert!(text.contains("Device: tank-1"));
        assert!(text.contains("Time"));
    }
}
