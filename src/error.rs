//! Error types for mediaproc
//!
//! This module provides error handling for the library, including:
//! - The pipeline error taxonomy (network fetch, transcode, all-items-failed)
//! - Structured boundary errors with machine-readable kinds
//! - Context information (operation, config key, source URL)

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for mediaproc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mediaproc
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
///
/// Propagation policy: batch-acquisition errors are recorded per item and never
/// returned to the caller (the batch always settles); extraction errors halt the
/// state machine; packaging aborts only when zero items could be written.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote fetch failed (download phase of an extraction, or one batch item)
    #[error("network fetch failed: {message}")]
    NetworkFetch {
        /// Human-readable description of the fetch failure
        message: String,
    },

    /// Transcoding engine failure, covering both engine load and conversion
    #[error("transcode failed: {message}")]
    Transcode {
        /// Human-readable description of the engine failure
        message: String,
    },

    /// Packaging aborted: not a single item could be written into the archive
    #[error("all items failed: no entries could be written into the archive")]
    AllItemsFailed,

    /// Operation attempted in a state that does not permit it
    #[error("cannot {operation}: {reason}")]
    InvalidState {
        /// The operation that was attempted (e.g., "package")
        operation: String,
        /// Why the current state rejects it
        reason: String,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "fetch.request_timeout_secs")
        key: Option<String>,
    },

    /// I/O error (scratch files for the external transcoder)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation cancelled by disposal of its owner
    #[error("operation cancelled")]
    Cancelled,

    /// Fallback for unexpected failures, always fatal to its unit of work
    #[error("unknown error: {message}")]
    Unknown {
        /// Whatever is known about the failure
        message: String,
    },
}

impl Error {
    /// Create a network fetch error
    pub fn network(message: impl Into<String>) -> Self {
        Error::NetworkFetch {
            message: message.into(),
        }
    }

    /// Create a transcode error
    pub fn transcode(message: impl Into<String>) -> Self {
        Error::Transcode {
            message: message.into(),
        }
    }

    /// Create an invalid-state error for a rejected operation
    pub fn invalid_state(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidState {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error tied to a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Create an unknown (fallback) error
    pub fn unknown(message: impl Into<String>) -> Self {
        Error::Unknown {
            message: message.into(),
        }
    }

    /// Machine-readable kind for this error
    ///
    /// Stable snake_case strings; clients use these for programmatic handling
    /// (e.g., picking a localized message at the presentation boundary).
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NetworkFetch { .. } => "network_fetch",
            Error::Transcode { .. } => "transcode",
            Error::AllItemsFailed => "all_items_failed",
            Error::InvalidState { .. } => "invalid_state",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Cancelled => "cancelled",
            Error::Unknown { .. } => "unknown",
        }
    }

    /// Classify a reqwest error from fetching `url` into a [`Error::NetworkFetch`]
    ///
    /// Timeouts, connect failures, and HTTP status errors each get a distinct
    /// message prefix so the operator can tell them apart in logs.
    pub(crate) fn from_fetch(err: reqwest::Error, url: &str) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out fetching {url}")
        } else if err.is_connect() {
            format!("connection failed fetching {url}: {err}")
        } else if let Some(status) = err.status() {
            format!("server returned {status} fetching {url}")
        } else {
            format!("error fetching {url}: {err}")
        };
        Error::NetworkFetch { message }
    }
}

/// Structured error crossing the library boundary
///
/// The core returns only a machine-readable `kind` plus a default `message`;
/// localization of the message is an external collaborator concern.
///
/// # Example JSON
///
/// ```json
/// {
///   "kind": "network_fetch",
///   "message": "network fetch failed: request timed out fetching https://example.com/v.mp4"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error kind (e.g., "network_fetch", "transcode")
    pub kind: String,

    /// Human-readable default message, suitable for display when no
    /// localized text is available
    pub message: String,
}

impl ErrorDetail {
    /// Create an error detail from a kind and message
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<&Error> for ErrorDetail {
    fn from(error: &Error) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

impl From<Error> for ErrorDetail {
    fn from(error: Error) -> Self {
        ErrorDetail::from(&error)
    }
}
