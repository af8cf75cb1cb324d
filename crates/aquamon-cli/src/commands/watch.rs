//! Watch command implementation.
//!
//! Runs the refresh orchestrator and redraws the dashboard on every render.
//! In push mode the store's change stream drives refreshes; if the
//! subscription cannot be opened or ends, the orchestrator falls back to
//! polling and the dashboard says so. When stdin is a terminal, typed
//! commands change the filters and trigger an immediate refresh.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use time::Date;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use aquamon_core::{
    ChangeFeed, FilterState, KpiView, Orchestrator, OrchestratorHandle, OrchestratorOptions,
    RefreshEvent, RefreshMode,
};

use crate::config::Config;
use crate::format::{FormatOptions, format_dashboard};
use crate::style;
use crate::util::{build_pipeline, connect_store};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

const INPUT_HELP: &str = "Commands:
  device <id>       show one device
  all               show all devices
  range <from> <to> day range, YYYY-MM-DD or - for open
  range clear       remove the day range
  points <n>        number of chart points
  refresh           refresh now
  quit              stop watching";

/// Arguments for the watch command.
pub struct WatchArgs<'a> {
    pub filters: FilterState,
    pub mode: RefreshMode,
    pub interval: Duration,
    pub count: u32,
    pub json: bool,
    pub opts: &'a FormatOptions,
}

/// A command typed while watching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchInput {
    Device(Option<String>),
    Range(Option<Date>, Option<Date>),
    Points(usize),
    Refresh,
    Help,
    Quit,
}

impl WatchInput {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let input = match (command.to_lowercase().as_str(), args.as_slice()) {
            ("device" | "d", [id]) if id.eq_ignore_ascii_case("all") => Self::Device(None),
            ("device" | "d", [id]) => Self::Device(Some((*id).to_string())),
            ("all", []) => Self::Device(None),
            ("range", ["clear"]) => Self::Range(None, None),
            ("range", [from, to]) => {
                let from = parse_open_date(from)?;
                let to = parse_open_date(to)?;
                if let (Some(f), Some(t)) = (from, to)
                    && f > t
                {
                    return Err(format!("{} is after {}", f, t));
                }
                Self::Range(from, to)
            }
            ("points" | "p", [n]) => match n.parse::<usize>() {
                Ok(n) if n > 0 => Self::Points(n),
                _ => return Err(format!("'{}' is not a positive number", n)),
            },
            ("refresh" | "r", []) => Self::Refresh,
            ("help" | "?", []) => Self::Help,
            ("quit" | "q" | "exit", []) => Self::Quit,
            _ => return Err(format!("Unknown command '{}'. Type 'help'.", line.trim())),
        };
        Ok(Some(input))
    }

    async fn apply(&self, handle: &OrchestratorHandle) -> aquamon_core::Result<()> {
        match self {
            Self::Device(device) => handle.set_device(device.clone()).await,
            Self::Range(from, to) => handle.set_date_range(*from, *to).await,
            Self::Points(n) => handle.set_point_count(*n).await,
            Self::Refresh => handle.refresh_now().await,
            Self::Help | Self::Quit => Ok(()),
        }
    }
}

fn parse_open_date(s: &str) -> Result<Option<Date>, String> {
    if s == "-" {
        return Ok(None);
    }
    aquamon_types::parse_date(s)
        .map(Some)
        .map_err(|e| e.to_string())
}

/// Spawn a task forwarding parsed stdin lines. Parse errors are printed directly.
fn spawn_input_reader(no_color: bool) -> mpsc::Receiver<WatchInput> {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match WatchInput::parse(&line) {
                Ok(Some(input)) => {
                    if tx.send(input).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => eprintln!("{}", style::format_warning(&e, no_color)),
            }
        }
    });
    rx
}

pub async fn cmd_watch(config: &Config, args: WatchArgs<'_>) -> Result<()> {
    let WatchArgs {
        filters,
        mode,
        interval,
        count,
        json,
        opts,
    } = args;

    let store = connect_store(config)?;
    let pipeline = build_pipeline(config, store.clone());
    let feed: Arc<dyn ChangeFeed> = store;

    let options = OrchestratorOptions::default()
        .mode(mode)
        .poll_interval(interval)
        .filters(filters);
    options.validate().context("Invalid watch options")?;

    let (orchestrator, handle) = Orchestrator::new(pipeline, Some(feed), options);
    let mut events = handle.subscribe();
    let task = orchestrator.spawn();

    let interactive = !json && std::io::stdin().is_terminal();
    let clear = !json && std::io::stdout().is_terminal();
    let mut inputs = if interactive {
        eprintln!("{}", style::format_info("Type 'help' for commands.", opts.no_color));
        Some(spawn_input_reader(opts.no_color))
    } else {
        None
    };

    let mut renders: u32 = 0;
    let mut previous: Option<KpiView> = None;
    let mut current_mode = mode;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nShutting down...");
                break;
            }
            Some(input) = next_input(&mut inputs) => {
                match input {
                    WatchInput::Quit => break,
                    WatchInput::Help => eprintln!("{}", INPUT_HELP),
                    other => {
                        if let Err(e) = other.apply(&handle).await {
                            warn!("Watch command failed: {}", e);
                            break;
                        }
                    }
                }
            }
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Dashboard fell behind, skipping events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if json {
                    println!("{}", serde_json::to_string(&event)?);
                }

                match event {
                    RefreshEvent::Rendered { snapshot, mode, .. } => {
                        current_mode = mode;
                        if !json {
                            let frame = format_dashboard(&snapshot, previous.as_ref(), current_mode, opts);
                            if clear {
                                print!("{}", CLEAR_SCREEN);
                            }
                            println!("{}", frame);
                        }
                        previous = Some(snapshot.kpi);
                        renders += 1;
                        if count > 0 && renders >= count {
                            break;
                        }
                    }
                    RefreshEvent::ModeChanged { mode, reason } => {
                        current_mode = mode;
                        if !json {
                            let message = match reason {
                                Some(reason) => style::format_warning(
                                    &format!("Refreshing by {} ({})", mode, reason),
                                    opts.no_color,
                                ),
                                None => style::format_info(
                                    &format!("Refreshing by {}", mode),
                                    opts.no_color,
                                ),
                            };
                            eprintln!("{}", message);
                        }
                    }
                    RefreshEvent::RunDiscarded { seq, applied } => {
                        debug!(seq, applied, "Discarded stale run");
                    }
                    _ => {}
                }
            }
        }
    }

    handle.shutdown();
    task.await.context("Refresh task panicked")?;
    Ok(())
}

async fn next_input(inputs: &mut Option<mpsc::Receiver<WatchInput>>) -> Option<WatchInput> {
    match inputs {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
