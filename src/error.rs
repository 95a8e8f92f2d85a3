//! Error taxonomy for the Marketo extraction core.
//!
//! Every failure from the SOAP layer is normalized into one of these
//! variants before it reaches a caller. Higher layers (the lead fetcher,
//! the pipeline) never swallow or re-map them.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Classified failure from the extraction core.
#[derive(Debug, Error)]
pub enum MarketoError {
    /// Terminal, user-facing error: bad credentials, malformed request,
    /// unreachable or misconfigured endpoint. Never retried automatically.
    #[error("configuration error: {0}")]
    Config(String),

    /// Server-side internal error or rate limit. Surfaced to the caller so a
    /// higher-level policy may decide to retry the whole window; this layer
    /// does not retry it.
    #[error("retryable service error {code}: {message}")]
    RetryableService { code: String, message: String },

    /// Request timeout that exhausted the bounded retry budget.
    #[error("transport error: {0}")]
    Transport(String),

    /// `from >= to`; rejected before any network activity.
    #[error("invalid time range: from '{from}' is not before to '{to}'")]
    InvalidRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl MarketoError {
    /// True for errors a higher-level policy may retry (whole-window retry).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RetryableService { .. })
    }
}
