//! Crate-wide error type.
//!
//! Grounded on `sdk/rust/src/lib.rs`'s `Error` enum (teacher's client SDK),
//! extended with the `Conflict` and `ActivityExecution` variants this domain
//! needs that a generic workflow-automation client did not (see DESIGN.md).

use thiserror::Error;

/// Result type used throughout the SDK.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the agent SDK.
///
/// Maps onto the seven error kinds of the specification: Configuration,
/// Connection, NotFound, Conflict, Validation, ActivityExecution, Timeout.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing/invalid env var, malformed credential, empty required config
    /// key. Fatal at init.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Transport exhausted retries, or the flow engine is unreachable.
    #[error("connection error to {server}: {message}")]
    Connection { server: String, message: String },

    /// A non-2xx, non-404 HTTP response with a preserved body/status.
    #[error("server error ({status}) from {path}: {body}")]
    Server {
        status: u16,
        path: String,
        body: String,
    },

    /// Secret-key duplicate, or a workflow id already in use under a policy
    /// that doesn't allow replacement.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Bad parameter at an API boundary: empty required field, oversize key,
    /// a task action that isn't a member of `availableActions`, and so on.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Wraps any error raised inside an activity; carries the activity name
    /// and tenant for diagnostics, as required by the failure semantics
    /// summary.
    #[error("activity '{activity}' failed for tenant {tenant}: {source}")]
    ActivityExecution {
        activity: String,
        tenant: String,
        #[source]
        source: Box<Error>,
    },

    /// An HTTP or flow-engine call exceeded its deadline.
    #[error("operation '{operation}' timed out after {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other internal error, with a chained cause via `anyhow`.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Error::Conflict {
            message: message.into(),
        }
    }

    pub fn activity(activity: impl Into<String>, tenant: impl Into<String>, source: Error) -> Self {
        Error::ActivityExecution {
            activity: activity.into(),
            tenant: tenant.into(),
            source: Box::new(source),
        }
    }

    /// True for errors worth a caller-side retry loop at a higher level
    /// (worker reconnect loop), matching the propagation policy in the
    /// failure-semantics summary.
    pub fn is_retryable_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Error::Timeout {
                operation: error
                    .url()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "http".to_string()),
                elapsed_ms: 0,
            }
        } else {
            Error::Connection {
                server: error
                    .url()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                message: error.to_string(),
            }
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(error: url::ParseError) -> Self {
        Error::Configuration {
            message: format!("invalid URL: {}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_execution_wraps_source() {
        let inner = Error::validation("bad input");
        let wrapped = Error::activity("SendKnowledgeUpdate", "tenant-1", inner);
        let message = wrapped.to_string();
        assert!(message.contains("SendKnowledgeUpdate"));
        assert!(message.contains("tenant-1"));
    }

    #[test]
    fn connection_is_retryable() {
        let err = Error::Connection {
            server: "https://example.com".into(),
            message: "boom".into(),
        };
        assert!(err.is_retryable_connection());
        assert!(!Error::validation("x").is_retryable_connection());
    }
}
