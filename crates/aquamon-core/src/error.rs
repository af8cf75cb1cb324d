//! Error types for aquamon-core.
//!
//! Most of the pipeline never surfaces these: the fetcher degrades transport
//! failures to an empty result and the orchestrator degrades subscription
//! failures to polling. They are returned by the lower-level entry points
//! (`HttpStore`, `Fetcher::try_fetch`, CSV rendering, the orchestrator handle)
//! so callers that do want the cause can log or report it.
//!
//! | Error | Where it is absorbed |
//! |-------|----------------------|
//! | [`Error::NotReachable`], [`Error::Request`], [`Error::Status`], [`Error::Decode`] | `Fetcher::fetch` returns an empty list |
//! | [`Error::Subscription`] | orchestrator falls back to polling |
//! | [`Error::Unavailable`] | same as a transport failure |
//! | [`Error::Closed`] | handle calls after shutdown |

/// Errors that can occur in aquamon-core.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The store could not be reached at all.
    #[error("Store not reachable at {url}: {source}")]
    NotReachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP request failed after the connection was established.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store URL is malformed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The store answered with a non-success status.
    #[error("Store returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// The store answered with something that is not JSON.
    #[error("Failed to decode store response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Setting up or keeping the change subscription failed.
    #[error("Subscription failed: {0}")]
    Subscription(String),

    /// The transport is unavailable (used by the mock store and offline setups).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// CSV rendering failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The orchestrator is no longer running.
    #[error("Refresh orchestrator has stopped")]
    Closed,
}

impl Error {
    /// Whether the error comes from the transport rather than from local input.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::NotReachable { .. }
                | Error::Request(_)
                | Error::Status { .. }
                | Error::Decode(_)
                | Error::Unavailable(_)
        )
    }
}

/// Result type for aquamon-core operations.
pub type Result<T> = std::result::Result<T, Error>;
