//! Error types for data parsing in aquamon-types.

use thiserror::Error;

/// Errors that can occur when parsing sensor data.
///
/// The lenient entry points (`parse_timestamp`, `RawRecord::number`) never
/// produce these; they exist for the strict variants used by configuration
/// and command-line parsing.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// A timestamp token was not in any accepted format.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A date was not in `YYYY-MM-DD` form.
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    /// A metric name was not recognised.
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),
}

/// Result type alias using aquamon-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
