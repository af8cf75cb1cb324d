//! Command-line dashboard for water-quality sensor readings.
//!
//! The `aquamon` binary reads the device tree of a remote JSON store,
//! normalizes it and renders KPI tiles, chart series, reading tables,
//! per-metric statistics and CSV exports.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `watch` | Live dashboard, polling or push-driven |
//! | `export` | CSV export between two instants |
//! | `summary` | Per-metric average, minimum and maximum |
//! | `devices` | Devices present in the store |
//! | `chart` | Chart series as JSON |
//! | `fetch` | Normalized readings as JSON |
//! | `config` | Manage CLI configuration |
//! | `completions` | Generate shell completions |
//!
//! # Configuration
//!
//! The CLI reads `~/.config/aquamon/config.toml` (or platform equivalent),
//! or the file given with `--config`.
//!
//! # Environment Variables
//!
//! - `AQUAMON_STORE_URL`: store base URL (overridden by `--store-url`)
//! - `AQUAMON_DEVICE`: default device (overridden by `--device`)
//! - `NO_COLOR`: disable colored output when set
//!
//! # Examples
//!
//! ```bash
//! aquamon --store-url https://example.firebaseio.com watch --mode push
//! aquamon summary --device tank-1 --from 2024-03-01 --to 2024-03-07
//! aquamon export --start 2024-03-01 --end 2024-03-07
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod format;
pub mod style;
pub mod util;

// Re-export core dependencies for convenience
pub use aquamon_core;
pub use aquamon_types;
