//! Command implementations for the CLI.

mod chart;
mod config;
mod devices;
mod export;
mod fetch;
mod summary;
mod watch;

pub use chart::cmd_chart;
pub use config::cmd_config;
pub use devices::cmd_devices;
pub use export::{ExportArgs, cmd_export};
pub use fetch::cmd_fetch;
pub use summary::cmd_summary;
pub use watch::{WatchArgs, WatchInput, cmd_watch};
