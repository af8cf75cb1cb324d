//! Chart command implementation.

use anyhow::{Result, bail};

use crate::cli::FilterArgs;
use crate::config::Config;
use crate::format::{FormatOptions, format_chart_json};
use crate::util::{build_pipeline, connect_store, filter_state, write_output};

pub async fn cmd_chart(
    config: &Config,
    filter: &FilterArgs,
    points: Option<usize>,
    opts: &FormatOptions,
) -> Result<()> {
    let mut filters = filter_state(filter, config)?;
    if let Some(points) = points {
        if points == 0 {
            bail!("--points must be at least 1");
        }
        filters = filters.with_point_count(points);
    }

    let pipeline = build_pipeline(config, connect_store(config)?);
    let snapshot = pipeline.run_once(&filters).await;
    write_output(None, &format_chart_json(&snapshot.chart, opts)?)
}
