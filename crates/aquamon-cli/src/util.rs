//! Utility functions for CLI operations.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use time::{Date, OffsetDateTime, Time, UtcOffset};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use aquamon_core::{FilterState, HttpStore, Pipeline};
use aquamon_types::{parse_date, parse_timestamp_strict};

use crate::cli::FilterArgs;
use crate::config::{Config, ENV_STORE_URL};

/// Install the tracing subscriber. Logs go to stderr so stdout stays parseable.
pub fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("warn")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Get the store URL, with helpful error message.
pub fn require_store_url(config: &Config) -> Result<&str> {
    config.store_url.as_deref().ok_or_else(|| {
        anyhow::anyhow!(
            "No store URL configured. Use --store-url <URL>, set {} or run\n\
             'aquamon config set store-url <URL>'.",
            ENV_STORE_URL
        )
    })
}

/// Build the HTTP store client from the configuration.
pub fn connect_store(config: &Config) -> Result<Arc<HttpStore>> {
    let url = require_store_url(config)?;
    let store = HttpStore::with_options(url, config.store_options())
        .with_context(|| format!("Failed to create store client for {}", url))?;
    debug!(url = store.base_url(), root = store.root(), "Store client ready");
    Ok(Arc::new(store))
}

/// Pipeline over `store` with the configured normalizer, offset and fetch limit.
pub fn build_pipeline(config: &Config, store: Arc<HttpStore>) -> Pipeline {
    Pipeline::new(store)
        .normalizer(config.normalizer())
        .fetch_limit(config.refresh.fetch_limit)
        .utc_offset(config.utc_offset())
}

/// Filter controls from command arguments, falling back to the default device.
pub fn filter_state(args: &FilterArgs, config: &Config) -> Result<FilterState> {
    if let (Some(from), Some(to)) = (args.from, args.to)
        && from > to
    {
        bail!("--from ({}) is after --to ({})", from, to);
    }
    let device = args.device.clone().or_else(|| config.default_device.clone());
    Ok(FilterState::default()
        .with_device(device)
        .with_days(args.from, args.to)
        .with_point_count(config.refresh.point_count))
}

/// Parse an export bound.
///
/// Full timestamps are taken as given. A bare `YYYY-MM-DD` means the start
/// (or, with `end_of_day`, the last instant) of that day at `offset`.
pub fn parse_instant(s: &str, end_of_day: bool, offset: UtcOffset) -> Result<OffsetDateTime> {
    if let Ok(date) = parse_date(s) {
        return Ok(day_bound(date, end_of_day, offset));
    }
    parse_timestamp_strict(s).with_context(|| {
        format!("Invalid time '{}'. Use RFC3339 (2024-01-01T08:00:00Z) or YYYY-MM-DD", s)
    })
}

fn day_bound(date: Date, end_of_day: bool, offset: UtcOffset) -> OffsetDateTime {
    let time = if end_of_day {
        Time::from_hms_nano(23, 59, 59, 999_999_999).unwrap_or(Time::MIDNIGHT)
    } else {
        Time::MIDNIGHT
    };
    date.with_time(time).assume_offset(offset)
}

/// Write output to file or stdout
pub fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}
