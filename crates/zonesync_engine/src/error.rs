//! Error types for the sync engine.

use crate::classifier::RetryStrategy;
use thiserror::Error;
use zonesync_protocol::{DatabaseScope, RemoteError};

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors returned by engine operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A remote round trip failed. The strategy is the classifier's verdict
    /// and the complete contract for how to react.
    #[error("{database} database: {error} ({strategy})")]
    Remote {
        /// Database the operation targeted.
        database: DatabaseScope,
        /// The remote failure.
        error: RemoteError,
        /// Classified reaction.
        strategy: RetryStrategy,
    },

    /// No zone is known yet for creating records in this database.
    #[error("no zone is known yet for new records in the {database} database")]
    ZoneNotYetKnown {
        /// Target database.
        database: DatabaseScope,
    },

    /// The remote store answered in a way that violates its contract.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The operation was cancelled locally.
    #[error("sync cancelled")]
    Cancelled,

    /// A snapshot could not be encoded or decoded.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl SyncError {
    /// Returns the retry strategy of a remote failure.
    pub fn strategy(&self) -> Option<&RetryStrategy> {
        match self {
            SyncError::Remote { strategy, .. } => Some(strategy),
            _ => None,
        }
    }

    /// Returns the remote failure, if any.
    pub fn remote_error(&self) -> Option<&RemoteError> {
        match self {
            SyncError::Remote { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Returns true if this failure happened locally, without touching
    /// remote state.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            SyncError::ZoneNotYetKnown { .. } | SyncError::Cancelled | SyncError::Snapshot(_)
        )
    }

    /// Returns true if the operation can be re-run automatically.
    pub fn is_retryable(&self) -> bool {
        self.strategy().is_some_and(RetryStrategy::is_automatic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use zonesync_protocol::RemoteErrorCode;

    #[test]
    fn retryable_errors() {
        let busy = SyncError::Remote {
            database: DatabaseScope::Private,
            error: RemoteError::new(RemoteErrorCode::ZoneBusy, "busy"),
            strategy: RetryStrategy::RetryAfter(Some(Duration::from_secs(1))),
        };
        assert!(busy.is_retryable());
        assert!(!busy.is_local());
        assert!(!SyncError::Cancelled.is_retryable());
        assert!(SyncError::Cancelled.is_local());
    }

    #[test]
    fn error_display() {
        let err = SyncError::ZoneNotYetKnown {
            database: DatabaseScope::Private,
        };
        assert_eq!(
            err.to_string(),
            "no zone is known yet for new records in the private database"
        );

        let err = SyncError::Remote {
            database: DatabaseScope::Shared,
            error: RemoteError::new(RemoteErrorCode::NetworkFailure, "reset"),
            strategy: RetryStrategy::RetryImmediately,
        };
        assert_eq!(
            err.to_string(),
            "shared database: network_failure: reset (retry immediately)"
        );
    }
}
