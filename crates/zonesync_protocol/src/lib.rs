//! # zonesync protocol
//!
//! Record model and remote-store vocabulary shared by the zonesync engine and
//! the reference in-memory store.
//!
//! This crate provides:
//! - Identifiers for databases, zones and records
//! - `Record` with typed field values and server change tags
//! - Closed schemas (`ListDraft`, `TodoDraft`) for building new records
//! - Change pages returned by database and zone delta fetches
//! - `RemoteError` and the closed set of remote error codes
//! - Three-way field merge for version conflicts
//! - Share construction
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod changes;
mod conflict;
mod error;
mod ids;
mod record;
mod schema;
mod share;

pub use changes::{
    ChangeCursor, DatabaseChangesPage, ModifyOutcome, ZoneChange, ZoneChangeKind,
    ZoneFetchOutcome, ZoneFetchRequest,
};
pub use conflict::merge_fields;
pub use error::{ItemKey, RemoteError, RemoteErrorCode, RemoteResult};
pub use ids::{DatabaseScope, RecordId, ZoneId, DEFAULT_OWNER, DEFAULT_ZONE_NAME};
pub use record::{ChangeTag, FieldValue, Record, RecordReference, RecordType, ReferenceAction};
pub use schema::{ListDraft, ListFields, RecordDraft, SchemaError, TodoDraft, TodoFields};
pub use share::{build_share, SHARE_ROOT_FIELD, SHARE_TITLE_FIELD};
