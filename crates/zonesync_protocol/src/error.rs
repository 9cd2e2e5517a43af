//! Remote store failures.

use crate::ids::{RecordId, ZoneId};
use crate::record::Record;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for remote store calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

macro_rules! error_codes {
    ($( $(#[$doc:meta])* $variant:ident = $code:literal, $name:literal; )*) => {
        /// Closed set of failure conditions reported by the remote store.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum RemoteErrorCode {
            $( $(#[$doc])* $variant, )*
        }

        impl RemoteErrorCode {
            /// Every code, ordered by numeric value.
            pub const ALL: &'static [RemoteErrorCode] = &[ $( RemoteErrorCode::$variant, )* ];

            /// Returns the stable numeric value.
            #[must_use]
            pub const fn to_code(self) -> u16 {
                match self {
                    $( RemoteErrorCode::$variant => $code, )*
                }
            }

            /// Parses a numeric value.
            pub fn from_code(code: u16) -> Option<Self> {
                match code {
                    $( $code => Some(RemoteErrorCode::$variant), )*
                    _ => None,
                }
            }

            /// Returns the snake_case name.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $( RemoteErrorCode::$variant => $name, )*
                }
            }

            /// Parses a snake_case name.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $name => Some(RemoteErrorCode::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

error_codes! {
    /// Unrecoverable server-side failure.
    InternalError = 1, "internal_error";
    /// Some items of a batch failed; see the item errors.
    PartialFailure = 2, "partial_failure";
    /// No network connection.
    NetworkUnavailable = 3, "network_unavailable";
    /// The network dropped the request.
    NetworkFailure = 4, "network_failure";
    /// The container is misconfigured.
    BadContainer = 5, "bad_container";
    /// The service is temporarily unavailable.
    ServiceUnavailable = 6, "service_unavailable";
    /// The client is being rate limited.
    RequestRateLimited = 7, "request_rate_limited";
    /// The app lacks the required entitlement.
    MissingEntitlement = 8, "missing_entitlement";
    /// No account is signed in.
    NotAuthenticated = 9, "not_authenticated";
    /// The user may not perform this operation.
    PermissionFailure = 10, "permission_failure";
    /// The record does not exist.
    UnknownItem = 11, "unknown_item";
    /// The request was malformed.
    InvalidArguments = 12, "invalid_arguments";
    /// A result set was truncated.
    ResultsTruncated = 13, "results_truncated";
    /// The server version of the record is newer than the one submitted.
    ServerRecordChanged = 14, "server_record_changed";
    /// The server rejected the request.
    ServerRejectedRequest = 15, "server_rejected_request";
    /// An asset file could not be found.
    AssetFileNotFound = 16, "asset_file_not_found";
    /// An asset file changed while being saved.
    AssetFileModified = 17, "asset_file_modified";
    /// The app version is no longer supported.
    IncompatibleVersion = 18, "incompatible_version";
    /// A unique constraint was violated.
    ConstraintViolation = 19, "constraint_violation";
    /// The operation was cancelled.
    OperationCancelled = 20, "operation_cancelled";
    /// The change cursor has expired.
    ChangeTokenExpired = 21, "change_token_expired";
    /// The item failed because another item of the atomic batch failed.
    BatchRequestFailed = 22, "batch_request_failed";
    /// The zone is busy.
    ZoneBusy = 23, "zone_busy";
    /// The operation is not valid for this database.
    BadDatabase = 24, "bad_database";
    /// The user's storage quota is exhausted.
    QuotaExceeded = 25, "quota_exceeded";
    /// The zone does not exist.
    ZoneNotFound = 26, "zone_not_found";
    /// The request exceeded a size limit.
    LimitExceeded = 27, "limit_exceeded";
    /// The user deleted the zone.
    UserDeletedZone = 28, "user_deleted_zone";
    /// The share has too many participants.
    TooManyParticipants = 29, "too_many_participants";
    /// The record is already shared by another share.
    AlreadyShared = 30, "already_shared";
    /// A reference target does not exist.
    ReferenceViolation = 31, "reference_violation";
    /// The account is managed and restricted.
    ManagedAccountRestricted = 32, "managed_account_restricted";
    /// The participant must verify before accepting the share.
    ParticipantMayNeedVerification = 33, "participant_may_need_verification";
    /// The response was lost; the request may or may not have applied.
    ServerResponseLost = 34, "server_response_lost";
    /// An asset is not available.
    AssetNotAvailable = 35, "asset_not_available";
    /// The account is temporarily unavailable.
    AccountTemporarilyUnavailable = 36, "account_temporarily_unavailable";
}

impl fmt::Display for RemoteErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Key of a sub-error inside a partial failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    /// A record of the batch.
    Record(RecordId),
    /// A zone of the batch.
    Zone(ZoneId),
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Record(id) => write!(f, "record {id}"),
            ItemKey::Zone(zone) => write!(f, "zone {zone}"),
        }
    }
}

/// A structured failure reported by the remote store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct RemoteError {
    /// Failure condition.
    pub code: RemoteErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Server-suggested delay before retrying.
    pub retry_after: Option<Duration>,
    /// Current server record, for version conflicts.
    pub server_record: Option<Box<Record>>,
    /// Version the client based its change on, for version conflicts.
    pub ancestor_record: Option<Box<Record>>,
    /// The record the client submitted, for version conflicts.
    pub client_record: Option<Box<Record>>,
    /// Per-item failures of a partial failure.
    pub item_errors: Vec<(ItemKey, RemoteError)>,
}

impl RemoteError {
    /// Creates an error with no payload.
    pub fn new(code: RemoteErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after: None,
            server_record: None,
            ancestor_record: None,
            client_record: None,
            item_errors: Vec::new(),
        }
    }

    /// Sets the server-suggested retry delay.
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// A version conflict carrying the three record versions.
    pub fn record_changed(
        server: Record,
        ancestor: Option<Record>,
        client: Record,
    ) -> Self {
        let mut error = Self::new(
            RemoteErrorCode::ServerRecordChanged,
            format!("record {} was modified on the server", server.id),
        );
        error.server_record = Some(Box::new(server));
        error.ancestor_record = ancestor.map(Box::new);
        error.client_record = Some(Box::new(client));
        error
    }

    /// A partial failure wrapping per-item errors.
    pub fn partial(item_errors: Vec<(ItemKey, RemoteError)>) -> Self {
        let mut error = Self::new(
            RemoteErrorCode::PartialFailure,
            format!("{} item(s) failed", item_errors.len()),
        );
        error.item_errors = item_errors;
        error
    }

    /// Returns the sub-error for a record, if this is a partial failure.
    pub fn item_error(&self, id: &RecordId) -> Option<&RemoteError> {
        self.item_errors.iter().find_map(|(key, err)| match key {
            ItemKey::Record(rid) if rid == id => Some(err),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for code in RemoteErrorCode::ALL {
            assert_eq!(RemoteErrorCode::from_code(code.to_code()), Some(*code));
            assert_eq!(RemoteErrorCode::from_name(code.name()), Some(*code));
        }
        assert_eq!(RemoteErrorCode::ALL.len(), 36);
        assert_eq!(RemoteErrorCode::from_code(0), None);
        assert_eq!(RemoteErrorCode::from_name("nope"), None);
    }

    #[test]
    fn error_display() {
        let err = RemoteError::new(RemoteErrorCode::ZoneBusy, "try later")
            .with_retry_after(Duration::from_secs(3));
        assert_eq!(err.to_string(), "zone_busy: try later");
        assert_eq!(err.retry_after, Some(Duration::from_secs(3)));
    }

    #[test]
    fn partial_failure_lookup() {
        let id = RecordId::new(ZoneId::owned("todos"), "a");
        let other = RecordId::new(ZoneId::owned("todos"), "b");
        let err = RemoteError::partial(vec![(
            ItemKey::Record(id.clone()),
            RemoteError::new(RemoteErrorCode::QuotaExceeded, "full"),
        )]);

        assert_eq!(err.code, RemoteErrorCode::PartialFailure);
        assert_eq!(
            err.item_error(&id).map(|e| e.code),
            Some(RemoteErrorCode::QuotaExceeded)
        );
        assert!(err.item_error(&other).is_none());
    }
}
