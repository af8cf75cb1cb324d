//! Devices command implementation.

use anyhow::Result;
use aquamon_core::device_list;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::format::{FormatOptions, format_devices_json, format_devices_text};
use crate::util::{build_pipeline, connect_store, write_output};

pub async fn cmd_devices(config: &Config, format: OutputFormat, opts: &FormatOptions) -> Result<()> {
    let pipeline = build_pipeline(config, connect_store(config)?);
    let devices = device_list(&pipeline.load().await);

    let content = match format {
        OutputFormat::Json => format_devices_json(&devices, opts)?,
        OutputFormat::Text => format_devices_text(&devices, opts),
    };
    write_output(None, &content)
}
