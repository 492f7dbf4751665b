//! Error taxonomy for the sync pipeline.
//!
//! - `FetchError`: provider HTTP failures (transient ones are retried)
//! - `TransformError`: a source record without a usable stable key
//! - `StoreError`: datastore failures (transient ones are retried)
//! - `SyncError`: the only errors that escape a run

use crate::models::{EntityKind, Provider};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{provider} circuit breaker is open")]
    CircuitOpen { provider: Provider },

    #[error("request timed out: {url}")]
    Timeout { url: String },

    #[error("network error for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("rate limited by {url}")]
    RateLimited { url: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("invalid JSON from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl FetchError {
    /// Network hiccups, timeouts, 429 and 5xx are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. }
            | FetchError::Network { .. }
            | FetchError::RateLimited { .. } => true,
            FetchError::Status { status, .. } => *status >= 500,
            FetchError::CircuitOpen { .. }
            | FetchError::Decode { .. }
            | FetchError::InvalidUrl(_)
            | FetchError::ClientBuild(_) => false,
        }
    }

    /// Whether the failure says something about provider health.
    pub(crate) fn counts_against_provider(&self) -> bool {
        self.is_transient()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("{entity} payload has no usable `{field}`")]
    MissingKey {
        entity: EntityKind,
        field: &'static str,
    },

    #[error("malformed {entity} payload: {reason}")]
    Malformed { entity: EntityKind, reason: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("run lock for {0} is unavailable")]
    LockUnavailable(EntityKind),

    #[error("stored row is unreadable: {0}")]
    InvalidRow(String),

    #[error("operation not supported for {0}")]
    Unsupported(EntityKind),
}

impl StoreError {
    /// Connection-level failures that are likely to clear up on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(e) => is_retriable_message(&e.to_string()),
            _ => false,
        }
    }
}

/// Check if a database error message looks transient
pub(crate) fn is_retriable_message(message: &str) -> bool {
    let err_str = message.to_lowercase();

    err_str.contains("connection")
        || err_str.contains("timeout")
        || err_str.contains("timed out")
        || err_str.contains("broken pipe")
        || err_str.contains("pool closed")
        // PostgreSQL specific transient errors
        || err_str.contains("could not serialize")
        || err_str.contains("deadlock detected")
        || err_str.contains("too many clients")
        || err_str.contains("server closed the connection")
        || err_str.contains("ssl error")
        || err_str.contains("network error")
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("setup error: {0}")]
    Setup(String),

    #[error("a {0} sync is already running")]
    AlreadyRunning(EntityKind),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_transience() {
        let url = "http://x".to_string();
        assert!(FetchError::Timeout { url: url.clone() }.is_transient());
        assert!(FetchError::RateLimited { url: url.clone() }.is_transient());
        assert!(FetchError::Status { url: url.clone(), status: 503 }.is_transient());
        assert!(!FetchError::Status { url: url.clone(), status: 404 }.is_transient());
        assert!(!FetchError::Decode { url, message: "eof".into() }.is_transient());
        assert!(!FetchError::CircuitOpen { provider: Provider::EspnSite }.is_transient());
    }

    #[test]
    fn test_retriable_messages() {
        assert!(is_retriable_message("connection refused"));
        assert!(is_retriable_message("deadlock detected"));
        assert!(is_retriable_message("pool timed out while waiting for an open connection"));
        assert!(!is_retriable_message("duplicate key value violates unique constraint"));
        assert!(!is_retriable_message("column does not exist"));
    }

    #[test]
    fn test_constraint_errors_are_not_transient() {
        assert!(!StoreError::Constraint("players_team_id_fkey".into()).is_transient());
        assert!(!StoreError::LockUnavailable(EntityKind::Team).is_transient());
    }
}
