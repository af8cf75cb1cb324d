//! Terminal styling helpers.
//!
//! Every helper takes a `no_color` flag and falls back to plain ASCII
//! markers when it is set, so output stays readable when piped.

use owo_colors::OwoColorize;

use aquamon_core::normalize::{LIVE_METRICS, PLACEHOLDER_VALUE};
use aquamon_core::present::NO_DATA;
use aquamon_types::Metric;

/// Sparkline glyphs, lowest to highest.
const SPARK_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
/// ASCII sparkline glyphs.
const SPARK_ASCII: [char; 4] = ['_', '.', '-', '^'];

// ============================================================================
// Messages
// ============================================================================

/// Format a success message.
pub fn format_success(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[OK] {}", message)
    } else {
        format!("{} {}", "[OK]".green(), message)
    }
}

/// Format an info message.
pub fn format_info(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[--] {}", message)
    } else {
        format!("{} {}", "[--]".cyan(), message)
    }
}

/// Format a warning message.
pub fn format_warning(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[!!] {}", message)
    } else {
        format!("{} {}", "[!!]".yellow(), message)
    }
}

/// Format a title header.
pub fn format_title(title: &str, no_color: bool) -> String {
    let underline = "━".repeat(title.chars().count());
    if no_color {
        format!("{}\n{}", title, underline)
    } else {
        format!("{}\n{}", title.bold(), underline.dimmed())
    }
}

// ============================================================================
// Values
// ============================================================================

/// Whether `value` is the fixed value of a metric with no deployed sensor.
fn is_placeholder(metric: Metric, value: Option<f64>) -> bool {
    !LIVE_METRICS.contains(&metric) && value == Some(PLACEHOLDER_VALUE)
}

/// Color a rendered metric value.
///
/// Missing values and placeholders are dimmed, values pinned to a range
/// bound are yellow.
pub fn format_metric_colored(metric: Metric, value: Option<f64>, text: &str, no_color: bool) -> String {
    if no_color {
        return text.to_string();
    }
    match value {
        None => format!("{}", text.dimmed()),
        _ if is_placeholder(metric, value) => format!("{}", text.dimmed()),
        Some(v) => {
            let range = metric.range();
            if v <= range.min || v >= range.max {
                format!("{}", text.yellow())
            } else {
                format!("{}", text.green())
            }
        }
    }
}

/// Trend arrow between two values of the same metric.
pub fn trend_indicator(current: Option<f64>, previous: Option<f64>, no_color: bool) -> &'static str {
    let (Some(current), Some(previous)) = (current, previous) else {
        return " ";
    };
    let diff = current - previous;
    if diff.abs() < 0.005 {
        "-"
    } else if diff > 0.0 {
        if no_color { "^" } else { "↑" }
    } else if no_color {
        "v"
    } else {
        "↓"
    }
}

/// One-line sparkline of a chart series. Gaps render as spaces.
pub fn sparkline(values: &[Option<f64>], no_color: bool) -> String {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let Some(min) = present.iter().copied().reduce(f64::min) else {
        return NO_DATA.to_string();
    };
    let max = present.iter().copied().fold(min, f64::max);
    let span = max - min;

    let glyphs: &[char] = if no_color { &SPARK_ASCII } else { &SPARK_CHARS };
    let top = glyphs.len() - 1;
    values
        .iter()
        .map(|v| match v {
            None => ' ',
            Some(_) if span <= 0.0 => glyphs[top / 2],
            Some(v) => {
                let level = ((v - min) / span * top as f64).round() as usize;
                glyphs[level.min(top)]
            }
        })
        .collect()
}

/// Apply the table style used by every text view.
pub fn apply_table_style(table: &mut tabled::Table, no_color: bool) {
    use tabled::settings::Style;
    if no_color {
        table.with(Style::ascii());
    } else {
        table.with(Style::rounded());
    }
}
