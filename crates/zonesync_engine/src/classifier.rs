//! Mapping of remote failures to retry strategies.
//!
//! This is the only place where remote error codes are interpreted. Every
//! other component reacts to the [`RetryStrategy`] it returns.

use std::fmt;
use std::time::Duration;
use zonesync_protocol::{ItemKey, Record, RemoteError, RemoteErrorCode};

/// How to react to a failed remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Surface the failure to the user; no automated remedy.
    PromptUser,
    /// Stop; the failure indicates a programming or configuration error.
    FatalStop,
    /// Reconcile field by field against the server version and resubmit.
    MergeAndRetry {
        /// Version the client's change was based on.
        ancestor: Option<Box<Record>>,
        /// Current server version.
        server: Option<Box<Record>>,
        /// Version the client submitted.
        client: Option<Box<Record>>,
    },
    /// Re-read the record before resubmitting, to avoid duplicate writes.
    VerifyThenRetry,
    /// Recreate the missing zone or resolve the existing share, then retry.
    ReconcileThenRetry,
    /// The operation was cancelled; do nothing.
    NoRetry,
    /// Drop every cursor and fetch everything again.
    InvalidateCursorsAndRefetchAll,
    /// Split the batch into smaller batches and retry.
    SplitBatchAndRetry,
    /// Retry once connectivity returns.
    RetryWhenNetworkRestored,
    /// Retry right away.
    RetryImmediately,
    /// Send the user through an external verification flow.
    RedirectToVerification,
    /// Retry after the server-suggested delay, if any.
    RetryAfter(Option<Duration>),
    /// Some items failed; each carries its own error. Only those items
    /// should be retried, each according to its own classification.
    PartialFailure(Vec<(ItemKey, RemoteError)>),
    /// The item failed only because another item of its atomic batch failed.
    NoActionableError,
    /// No safe automated action.
    Unknown,
}

impl RetryStrategy {
    /// Server-suggested delay before retrying, if the strategy carries one.
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            RetryStrategy::RetryAfter(delay) => *delay,
            _ => None,
        }
    }

    /// Returns true if re-running a read is safe without user involvement.
    pub fn is_automatic(&self) -> bool {
        matches!(
            self,
            RetryStrategy::RetryImmediately
                | RetryStrategy::RetryAfter(_)
                | RetryStrategy::InvalidateCursorsAndRefetchAll
                | RetryStrategy::VerifyThenRetry
        )
    }

    /// Returns true if the user has to be involved.
    pub fn needs_user(&self) -> bool {
        matches!(
            self,
            RetryStrategy::PromptUser
                | RetryStrategy::FatalStop
                | RetryStrategy::RedirectToVerification
                | RetryStrategy::Unknown
        )
    }
}

impl fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryStrategy::PromptUser => write!(f, "prompt user"),
            RetryStrategy::FatalStop => write!(f, "fatal stop"),
            RetryStrategy::MergeAndRetry { .. } => write!(f, "merge and retry"),
            RetryStrategy::VerifyThenRetry => write!(f, "verify then retry"),
            RetryStrategy::ReconcileThenRetry => write!(f, "reconcile then retry"),
            RetryStrategy::NoRetry => write!(f, "no retry"),
            RetryStrategy::InvalidateCursorsAndRefetchAll => {
                write!(f, "invalidate cursors and refetch all")
            }
            RetryStrategy::SplitBatchAndRetry => write!(f, "split batch and retry"),
            RetryStrategy::RetryWhenNetworkRestored => write!(f, "retry when network restored"),
            RetryStrategy::RetryImmediately => write!(f, "retry immediately"),
            RetryStrategy::RedirectToVerification => write!(f, "redirect to verification"),
            RetryStrategy::RetryAfter(Some(delay)) => {
                write!(f, "retry after {}s", delay.as_secs_f64())
            }
            RetryStrategy::RetryAfter(None) => write!(f, "retry later"),
            RetryStrategy::PartialFailure(items) => {
                write!(f, "partial failure ({} item(s))", items.len())
            }
            RetryStrategy::NoActionableError => write!(f, "no actionable error"),
            RetryStrategy::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classification policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifierPolicy {
    /// Treat programming and configuration errors as fatal instead of
    /// surfacing them to the user.
    pub strict: bool,
}

impl ClassifierPolicy {
    /// The strict policy.
    pub const fn strict() -> Self {
        Self { strict: true }
    }
}

/// Pure mapping from a remote error to exactly one [`RetryStrategy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier {
    policy: ClassifierPolicy,
}

impl ErrorClassifier {
    /// Creates a classifier with the given policy.
    pub fn new(policy: ClassifierPolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy.
    pub fn policy(&self) -> ClassifierPolicy {
        self.policy
    }

    /// Classifies a remote error.
    pub fn classify(&self, error: &RemoteError) -> RetryStrategy {
        use RemoteErrorCode::*;

        match error.code {
            InternalError | ServerRejectedRequest | InvalidArguments | UnknownItem
            | ResultsTruncated | AssetFileNotFound | AssetFileModified | BadContainer
            | BadDatabase | MissingEntitlement | ConstraintViolation | ReferenceViolation => {
                if self.policy.strict {
                    RetryStrategy::FatalStop
                } else {
                    RetryStrategy::PromptUser
                }
            }
            ServerRecordChanged => RetryStrategy::MergeAndRetry {
                ancestor: error.ancestor_record.clone(),
                server: error.server_record.clone(),
                client: error.client_record.clone(),
            },
            ServerResponseLost => RetryStrategy::VerifyThenRetry,
            ZoneNotFound | UserDeletedZone | AlreadyShared => RetryStrategy::ReconcileThenRetry,
            OperationCancelled => RetryStrategy::NoRetry,
            ChangeTokenExpired => RetryStrategy::InvalidateCursorsAndRefetchAll,
            LimitExceeded => RetryStrategy::SplitBatchAndRetry,
            NotAuthenticated | PermissionFailure | IncompatibleVersion | TooManyParticipants
            | ManagedAccountRestricted | AccountTemporarilyUnavailable | AssetNotAvailable => {
                RetryStrategy::PromptUser
            }
            NetworkUnavailable => RetryStrategy::RetryWhenNetworkRestored,
            NetworkFailure => RetryStrategy::RetryImmediately,
            ParticipantMayNeedVerification => RetryStrategy::RedirectToVerification,
            ServiceUnavailable | RequestRateLimited | ZoneBusy => {
                RetryStrategy::RetryAfter(error.retry_after)
            }
            PartialFailure => RetryStrategy::PartialFailure(error.item_errors.clone()),
            BatchRequestFailed => RetryStrategy::NoActionableError,
            QuotaExceeded => RetryStrategy::Unknown,
        }
    }

    /// Classifies each sub-error of a partial failure independently.
    pub fn classify_items(&self, items: &[(ItemKey, RemoteError)]) -> Vec<(ItemKey, RetryStrategy)> {
        items
            .iter()
            .map(|(key, error)| (key.clone(), self.classify(error)))
            .collect()
    }

    /// Classifies the failure of a single-item request.
    ///
    /// A partial failure whose only sub-error belongs to `key` is classified
    /// by that sub-error, since the item is the whole request.
    pub fn classify_for_item(&self, error: &RemoteError, key: &ItemKey) -> RetryStrategy {
        if error.code == RemoteErrorCode::PartialFailure {
            if let [(item, inner)] = error.item_errors.as_slice() {
                if item == key {
                    return self.classify(inner);
                }
            }
        }
        self.classify(error)
    }
}
