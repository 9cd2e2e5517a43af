//! Error types for direct store manipulation.

use thiserror::Error;
use zonesync_protocol::{DatabaseScope, RecordId, ZoneId};

/// Result type for store helpers.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by the store's server-side helpers.
///
/// Remote operations report failures as `RemoteError`s instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The zone does not exist.
    #[error("unknown zone {zone} in the {database} database")]
    UnknownZone {
        /// Database searched.
        database: DatabaseScope,
        /// Missing zone.
        zone: ZoneId,
    },

    /// The record does not exist.
    #[error("unknown record {id} in the {database} database")]
    UnknownRecord {
        /// Database searched.
        database: DatabaseScope,
        /// Missing record.
        id: RecordId,
    },
}
