//! Summary command implementation.

use anyhow::Result;

use crate::cli::{FilterArgs, OutputFormat};
use crate::config::Config;
use crate::format::{FormatOptions, format_summary_json, format_summary_text};
use crate::util::{build_pipeline, connect_store, filter_state, write_output};

pub async fn cmd_summary(
    config: &Config,
    filter: &FilterArgs,
    format: OutputFormat,
    opts: &FormatOptions,
) -> Result<()> {
    let filters = filter_state(filter, config)?;
    let pipeline = build_pipeline(config, connect_store(config)?);
    let snapshot = pipeline.run_once(&filters).await;

    let content = match format {
        OutputFormat::Json => format_summary_json(&snapshot.summary, opts)?,
        OutputFormat::Text => format_summary_text(&snapshot.summary, opts),
    };
    write_output(None, &content)
}
