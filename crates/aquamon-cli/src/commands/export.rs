//! Export command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use aquamon_core::CsvExport;

use crate::config::Config;
use crate::format::FormatOptions;
use crate::style;
use crate::util::{build_pipeline, connect_store, parse_instant, write_output};

/// Arguments for the export command.
pub struct ExportArgs<'a> {
    pub start: &'a str,
    pub end: &'a str,
    pub device: Option<String>,
    pub output: Option<PathBuf>,
    pub stdout: bool,
    pub quiet: bool,
    pub opts: &'a FormatOptions,
}

pub async fn cmd_export(config: &Config, args: ExportArgs<'_>) -> Result<()> {
    let offset = config.utc_offset();
    let start = parse_instant(args.start, false, offset).context("Invalid --start")?;
    let end = parse_instant(args.end, true, offset).context("Invalid --end")?;
    if start > end {
        bail!("--start ({}) is after --end ({})", args.start, args.end);
    }

    let mut export = CsvExport::new(start, end);
    if let Some(device) = args.device.or_else(|| config.default_device.clone()) {
        export = export.device(device);
    }

    let pipeline = build_pipeline(config, connect_store(config)?);
    let cache = pipeline.load().await;
    let rows = export.select(&cache).len();
    let document = export
        .render(&cache, offset)
        .context("Failed to render CSV")?;

    if args.stdout {
        return write_output(None, &document);
    }

    let path = args
        .output
        .unwrap_or_else(|| PathBuf::from(export.file_name(offset)));
    write_output(Some(&path), &document)?;

    if !args.quiet {
        eprintln!(
            "{}",
            style::format_success(
                &format!("Exported {} readings to {}", rows, path.display()),
                args.opts.no_color
            )
        );
    }
    Ok(())
}
