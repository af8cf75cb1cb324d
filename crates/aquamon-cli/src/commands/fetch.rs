//! Fetch command implementation.

use anyhow::Result;
use aquamon_core::FetchOptions;
use tracing::debug;

use crate::cli::FilterArgs;
use crate::config::Config;
use crate::format::FormatOptions;
use crate::util::{build_pipeline, connect_store, filter_state, write_output};

pub async fn cmd_fetch(
    config: &Config,
    filter: &FilterArgs,
    limit: Option<usize>,
    opts: &FormatOptions,
) -> Result<()> {
    let filters = filter_state(filter, config)?;
    let pipeline = build_pipeline(config, connect_store(config)?);

    // A device filter narrows the request itself instead of the cache.
    let mut options = FetchOptions::new().utc_offset(pipeline.offset());
    options.days = filters.days;
    options.device = filters.device;
    options.limit = limit.or(config.refresh.fetch_limit);

    let readings = pipeline.load_with(&options).await;
    debug!(count = readings.len(), "Fetched readings");
    write_output(None, &opts.as_json(&readings)?)
}
