//! Configuration file management.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::UtcOffset;

use aquamon_core::http::{DEFAULT_ROOT, HttpStoreOptions};
use aquamon_core::present::DEFAULT_POINT_COUNT;
use aquamon_core::{DemoFallback, NoFallback, Normalizer, RefreshMode};

use crate::cli::ConfigKey;

/// Environment variable overriding `store_url`.
pub const ENV_STORE_URL: &str = "AQUAMON_STORE_URL";
/// Environment variable overriding `default_device`.
pub const ENV_DEVICE: &str = "AQUAMON_DEVICE";

/// Offsets outside this range (in minutes) are rejected.
const UTC_OFFSET_LIMIT: i32 = 18 * 60;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the reading store.
    pub store_url: Option<String>,
    /// Path under the store holding one child per device.
    pub store_root: String,
    /// Device selected when a command is given none.
    pub default_device: Option<String>,
    /// Read request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Refresh settings.
    pub refresh: RefreshConfig,
    /// Display settings.
    pub display: DisplayConfig,
    /// Placeholder value settings.
    pub placeholder: PlaceholderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_url: None,
            store_root: DEFAULT_ROOT.to_string(),
            default_device: None,
            request_timeout_secs: 10,
            refresh: RefreshConfig::default(),
            display: DisplayConfig::default(),
            placeholder: PlaceholderConfig::default(),
        }
    }
}

/// How `watch` refreshes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshModeSetting {
    #[default]
    Poll,
    Push,
}

impl std::str::FromStr for RefreshModeSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "poll" | "polling" => Ok(Self::Poll),
            "push" => Ok(Self::Push),
            _ => Err(format!("expected 'poll' or 'push', got '{}'", s)),
        }
    }
}

impl From<RefreshModeSetting> for RefreshMode {
    fn from(setting: RefreshModeSetting) -> Self {
        match setting {
            RefreshModeSetting::Poll => RefreshMode::Polling,
            RefreshModeSetting::Push => RefreshMode::Push,
        }
    }
}

/// Refresh configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Polling or push.
    pub mode: RefreshModeSetting,
    /// Polling interval in seconds.
    pub interval_secs: u64,
    /// Number of chart points.
    pub point_count: usize,
    /// Maximum readings kept per run.
    pub fetch_limit: Option<usize>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            mode: RefreshModeSetting::Poll,
            interval_secs: 10,
            point_count: DEFAULT_POINT_COUNT,
            fetch_limit: None,
        }
    }
}

/// Display configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Offset from UTC used for calendar days and time labels, in minutes.
    pub utc_offset_minutes: i32,
    /// Disable colored output.
    pub no_color: bool,
}

/// Placeholder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceholderConfig {
    /// Replace missing or zero EC/TDS values with random demo values.
    pub demo_fallback: bool,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            demo_fallback: true,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Apply `AQUAMON_STORE_URL` and `AQUAMON_DEVICE` from the process environment.
    #[must_use]
    pub fn with_process_env(self) -> Self {
        self.with_env(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`. Empty values are ignored.
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_STORE_URL) {
            self.store_url = Some(url);
        }
        if let Some(device) = non_empty(ENV_DEVICE) {
            self.default_device = Some(device);
        }
        self
    }

    /// Validate the configuration and return every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if let Some(url) = &self.store_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            errors.push(ValidationError {
                field: "store_url".to_string(),
                message: format!("'{}' must start with http:// or https://", url),
            });
        }
        if self.store_root.trim_matches('/').is_empty() {
            errors.push(ValidationError {
                field: "store_root".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "request_timeout_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.refresh.interval_secs == 0 {
            errors.push(ValidationError {
                field: "refresh.interval_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.refresh.point_count == 0 {
            errors.push(ValidationError {
                field: "refresh.point_count".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.refresh.fetch_limit == Some(0) {
            errors.push(ValidationError {
                field: "refresh.fetch_limit".to_string(),
                message: "must be at least 1 (omit for no limit)".to_string(),
            });
        }
        if self.display.utc_offset_minutes.abs() > UTC_OFFSET_LIMIT {
            errors.push(ValidationError {
                field: "display.utc_offset_minutes".to_string(),
                message: format!(
                    "{} is outside -{limit}..={limit}",
                    self.display.utc_offset_minutes,
                    limit = UTC_OFFSET_LIMIT
                ),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Set one key from its string form.
    ///
    /// An empty value clears optional keys.
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let invalid = |message: String| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            message,
        };
        let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());

        match key {
            ConfigKey::StoreUrl => self.store_url = optional(value),
            ConfigKey::StoreRoot => self.store_root = value.trim_matches('/').to_string(),
            ConfigKey::DefaultDevice => self.default_device = optional(value),
            ConfigKey::RefreshMode => self.refresh.mode = value.parse().map_err(invalid)?,
            ConfigKey::IntervalSecs => {
                self.refresh.interval_secs = value.parse().map_err(|e| invalid(format!("{e}")))?
            }
            ConfigKey::PointCount => {
                self.refresh.point_count = value.parse().map_err(|e| invalid(format!("{e}")))?
            }
            ConfigKey::FetchLimit => {
                let limit: usize = if value.is_empty() {
                    0
                } else {
                    value.parse().map_err(|e| invalid(format!("{e}")))?
                };
                self.refresh.fetch_limit = (limit > 0).then_some(limit);
            }
            ConfigKey::UtcOffsetMinutes => {
                self.display.utc_offset_minutes =
                    value.parse().map_err(|e| invalid(format!("{e}")))?
            }
            ConfigKey::NoColor => self.display.no_color = parse_bool(value).map_err(invalid)?,
            ConfigKey::DemoFallback => {
                self.placeholder.demo_fallback = parse_bool(value).map_err(invalid)?
            }
            ConfigKey::RequestTimeoutSecs => {
                self.request_timeout_secs = value.parse().map_err(|e| invalid(format!("{e}")))?
            }
        }
        Ok(())
    }

    /// The configured display offset. Out-of-range values fall back to UTC.
    pub fn utc_offset(&self) -> UtcOffset {
        UtcOffset::from_whole_seconds(self.display.utc_offset_minutes.saturating_mul(60))
            .unwrap_or(UtcOffset::UTC)
    }

    /// Preferred refresh mode.
    pub fn refresh_mode(&self) -> RefreshMode {
        self.refresh.mode.into()
    }

    /// Polling interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.interval_secs.max(1))
    }

    /// Options for the HTTP store client.
    pub fn store_options(&self) -> HttpStoreOptions {
        HttpStoreOptions::default()
            .root(self.store_root.clone())
            .request_timeout(Duration::from_secs(self.request_timeout_secs.max(1)))
    }

    /// Normalizer with the configured placeholder policy.
    pub fn normalizer(&self) -> Normalizer {
        if self.placeholder.demo_fallback {
            Normalizer::new(Arc::new(DemoFallback))
        } else {
            Normalizer::new(Arc::new(NoFallback))
        }
    }
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!(
            "invalid boolean '{}'. Use: true/false, yes/no, on/off, 1/0",
            s
        )),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid value '{value}' for {key:?}: {message}")]
    InvalidValue {
        key: ConfigKey,
        value: String,
        message: String,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path (e.g., `refresh.interval_secs`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aquamon")
        .join("config.toml")
}
