use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use aquamon_cli::cli::{Cli, Commands, ModeArg};
use aquamon_cli::commands::{
    ExportArgs, WatchArgs, cmd_chart, cmd_config, cmd_devices, cmd_export, cmd_fetch,
    cmd_summary, cmd_watch,
};
use aquamon_cli::config::{Config, default_config_path};
use aquamon_cli::format::FormatOptions;
use aquamon_cli::util::{filter_state, init_tracing};
use aquamon_core::RefreshMode;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "aquamon", &mut io::stdout());
        return Ok(());
    }

    init_tracing(cli.verbose, cli.quiet);

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = Config::load_or_default(&config_path)?.with_process_env();
    if let Some(url) = &cli.store_url {
        config.store_url = Some(url.clone());
    }

    // Runs before validation so an out-of-range value can still be corrected.
    if let Commands::Config { action } = &cli.command {
        let opts = FormatOptions::new(cli.no_color || config.display.no_color);
        return cmd_config(action, &config_path, &config, &opts);
    }

    config.validate()?;
    let opts = FormatOptions::new(cli.no_color || config.display.no_color);

    match cli.command {
        Commands::Watch {
            filter,
            mode,
            interval,
            points,
            count,
            json,
        } => {
            let mut filters = filter_state(&filter, &config)?;
            if let Some(points) = points {
                filters = filters.with_point_count(points.max(1));
            }
            let mode = match mode {
                Some(ModeArg::Poll) => RefreshMode::Polling,
                Some(ModeArg::Push) => RefreshMode::Push,
                None => config.refresh_mode(),
            };
            let interval = interval
                .map(|secs| std::time::Duration::from_secs(secs.max(1)))
                .unwrap_or_else(|| config.poll_interval());
            cmd_watch(
                &config,
                WatchArgs {
                    filters,
                    mode,
                    interval,
                    count,
                    json,
                    opts: &opts,
                },
            )
            .await?;
        }
        Commands::Export {
            start,
            end,
            device,
            output,
            stdout,
        } => {
            cmd_export(
                &config,
                ExportArgs {
                    start: &start,
                    end: &end,
                    device,
                    output,
                    stdout,
                    quiet: cli.quiet,
                    opts: &opts,
                },
            )
            .await?;
        }
        Commands::Summary { filter, format } => {
            cmd_summary(&config, &filter, format, &opts).await?;
        }
        Commands::Devices { format } => {
            cmd_devices(&config, format, &opts).await?;
        }
        Commands::Chart { filter, points } => {
            cmd_chart(&config, &filter, points, &opts).await?;
        }
        Commands::Fetch { filter, limit } => {
            cmd_fetch(&config, &filter, limit, &opts).await?;
        }
        Commands::Config { .. } | Commands::Completions { .. } => {
            // Already handled above
        }
    }

    Ok(())
}
