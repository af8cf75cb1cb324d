//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use time::Date;

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Refresh mode override for `watch`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Re-run on a fixed interval
    Poll,
    /// Re-run when the store reports a change
    Push,
}

/// Device and day-range selection shared by the read commands
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Only this device (defaults to `default_device` from the config)
    #[arg(short, long)]
    pub device: Option<String>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date_arg)]
    pub from: Option<Date>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date_arg)]
    pub to: Option<Date>,
}

#[derive(Parser)]
#[command(name = "aquamon")]
#[command(author, version, about = "Dashboard for water-quality sensor readings", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Base URL of the reading store (overrides config and AQUAMON_STORE_URL)
    #[arg(long, global = true)]
    pub store_url: Option<String>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Live dashboard that refreshes on a timer or on store changes
    Watch {
        #[command(flatten)]
        filter: FilterArgs,

        /// Refresh mode (defaults to the config value)
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Polling interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,

        /// Number of chart points
        #[arg(short, long)]
        points: Option<usize>,

        /// Stop after this many renders (0 for unlimited)
        #[arg(short = 'n', long, default_value = "0")]
        count: u32,

        /// Emit each refresh event as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Export readings between two instants as CSV
    Export {
        /// Start of the range (RFC3339, or YYYY-MM-DD for start of day)
        #[arg(long)]
        start: String,

        /// End of the range (RFC3339, or YYYY-MM-DD for end of day)
        #[arg(long)]
        end: String,

        /// Only this device
        #[arg(short, long)]
        device: Option<String>,

        /// Write to this file (defaults to a generated name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the CSV to stdout
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
    },

    /// Per-metric average, minimum and maximum
    Summary {
        #[command(flatten)]
        filter: FilterArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List devices present in the store
    Devices {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Dump chart series as JSON
    Chart {
        #[command(flatten)]
        filter: FilterArgs,

        /// Number of chart points
        #[arg(short, long)]
        points: Option<usize>,
    },

    /// Fetch normalized readings as JSON
    Fetch {
        #[command(flatten)]
        filter: FilterArgs,

        /// Keep at most this many readings
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Base URL of the reading store
    StoreUrl,
    /// Path under the store holding the device tree
    StoreRoot,
    /// Device selected when none is given
    DefaultDevice,
    /// Refresh mode: poll or push
    RefreshMode,
    /// Polling interval in seconds
    IntervalSecs,
    /// Number of chart points
    PointCount,
    /// Maximum readings kept per run (0 for unlimited)
    FetchLimit,
    /// Offset from UTC for days and labels, in minutes
    UtcOffsetMinutes,
    /// Disable colored output
    NoColor,
    /// Fill missing EC/TDS with demo values
    DemoFallback,
    /// Read request timeout in seconds
    RequestTimeoutSecs,
}

/// Configuration subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
        /// Configuration value
        value: String,
    },
}

/// Parse a `YYYY-MM-DD` argument.
fn parse_date_arg(s: &str) -> Result<Date, String> {
    aquamon_types::parse_date(s).map_err(|e| e.to_string())
}
