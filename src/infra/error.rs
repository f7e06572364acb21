//! Error types for the list-provider infrastructure.
//!
//! The taxonomy follows the pipeline's propagation policy: per-shield errors
//! are transient and isolated (the row stays `Pending` and a later poll
//! retries), while log-corrupting conditions are fatal and halt the affected
//! writer.

use thiserror::Error;

use crate::crypto::{EncodingError, SigningError};
use crate::domain::{NetworkName, ShieldStatus};

/// Errors that can occur in the list-provider infrastructure
#[derive(Error, Debug)]
pub enum ListProviderError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Signing or verification error
    #[error("signing error: {0}")]
    Signing(#[from] SigningError),

    /// Canonical encoding error
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Chain RPC failure (transient; the affected row stays pending)
    #[error("chain rpc error: {0}")]
    ChainRpc(String),

    /// Policy gate failure (transient; the affected row stays pending)
    #[error("policy gate error: {0}")]
    Policy(String),

    /// Attempt to move a shield out of a terminal status
    #[error("status regression for shield {txid}:{commitment_hash}: {from} -> {to}")]
    StatusRegression {
        txid: String,
        commitment_hash: String,
        from: ShieldStatus,
        to: ShieldStatus,
    },

    /// Shield not present in the queue
    #[error("shield not found: {txid}:{commitment_hash}")]
    ShieldNotFound {
        txid: String,
        commitment_hash: String,
    },

    /// Attempt to move the ingest cursor backwards
    #[error("ingest cursor for {network} would regress: {current} -> {requested}")]
    CursorRegression {
        network: NetworkName,
        current: u64,
        requested: u64,
    },

    /// POI log corruption: non-dense index or broken starting-index chain
    #[error("poi log invariant violation for list {list_key}: {message}")]
    LogInvariantViolation { list_key: String, message: String },

    /// A provider for this list key already exists in the process
    #[error("list provider already initialized for list {0}")]
    AlreadyInitialized(String),

    /// A worker's run loop was started twice
    #[error("worker already running: {0}")]
    AlreadyRunning(&'static str),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl ListProviderError {
    /// Fatal errors abort the owning writer instead of being retried;
    /// continuing past them would corrupt state downstream consumers rely on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ListProviderError::StatusRegression { .. }
                | ListProviderError::LogInvariantViolation { .. }
        )
    }
}

/// Result type for list-provider operations
pub type Result<T> = std::result::Result<T, ListProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_regression_display() {
        let err = ListProviderError::StatusRegression {
            txid: "0xaa".to_string(),
            commitment_hash: "0xbb".to_string(),
            from: ShieldStatus::Allowed,
            to: ShieldStatus::Blocked,
        };
        let msg = err.to_string();
        assert!(msg.contains("status regression"));
        assert!(msg.contains("allowed -> blocked"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_log_invariant_violation_is_fatal() {
        let err = ListProviderError::LogInvariantViolation {
            list_key: "abcd".to_string(),
            message: "expected index 3, got 5".to_string(),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("invariant violation"));
    }

    #[test]
    fn test_transient_errors_are_not_fatal() {
        assert!(!ListProviderError::ChainRpc("timeout".to_string()).is_fatal());
        assert!(!ListProviderError::Policy("lookup failed".to_string()).is_fatal());
        assert!(!ListProviderError::Internal("oops".to_string()).is_fatal());
    }

    #[test]
    fn test_cursor_regression_display() {
        let err = ListProviderError::CursorRegression {
            network: NetworkName::Polygon,
            current: 100,
            requested: 90,
        };
        let msg = err.to_string();
        assert!(msg.contains("polygon"));
        assert!(msg.contains("100 -> 90"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ListProviderError>();
    }
}
