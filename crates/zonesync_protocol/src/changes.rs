//! Change pages exchanged with the remote store.

use crate::error::RemoteError;
use crate::ids::{RecordId, ZoneId};
use crate::record::{Record, RecordType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token marking the point up to which changes have been observed.
///
/// Cursors are produced by the remote store and handed back verbatim; the
/// engine never looks inside them.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeCursor(Vec<u8>);

impl ChangeCursor {
    /// Wraps raw cursor bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw cursor bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ChangeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChangeCursor(")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// How a zone changed at the database level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneChangeKind {
    /// Records inside the zone changed.
    Changed,
    /// Every record in the zone was purged; the zone itself remains.
    Purged,
    /// The zone was deleted.
    Deleted,
}

/// One page of a database-level change fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseChangesPage {
    /// Zones reported by this page, in the order the remote store reported them.
    pub zones: Vec<(ZoneId, ZoneChangeKind)>,
    /// Cursor covering this page.
    pub cursor: ChangeCursor,
    /// Whether more pages follow.
    pub more_coming: bool,
}

/// Request for the record changes of one zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneFetchRequest {
    /// Zone to fetch.
    pub zone: ZoneId,
    /// Last stored cursor; `None` fetches the whole zone.
    pub cursor: Option<ChangeCursor>,
}

/// A single record-level change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneChange {
    /// A record was created or updated; carries its current server state.
    RecordChanged(Record),
    /// A record was deleted.
    RecordDeleted {
        /// Deleted record.
        id: RecordId,
        /// Type the record had.
        record_type: RecordType,
    },
}

impl ZoneChange {
    /// Identifier of the affected record.
    pub fn record_id(&self) -> &RecordId {
        match self {
            ZoneChange::RecordChanged(record) => &record.id,
            ZoneChange::RecordDeleted { id, .. } => id,
        }
    }
}

/// Outcome of fetching one zone within a combined zone fetch.
///
/// Outcomes are delivered in completion order, which need not match the
/// request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneFetchOutcome {
    /// Zone this outcome belongs to.
    pub zone: ZoneId,
    /// Changes since the requested cursor.
    pub changes: Vec<ZoneChange>,
    /// New zone cursor. Absent when the zone failed.
    pub cursor: Option<ChangeCursor>,
    /// Whether the zone has further changes beyond `cursor`.
    pub more_coming: bool,
    /// Zone-level failure; when set, `changes` must not be applied.
    pub error: Option<RemoteError>,
}

impl ZoneFetchOutcome {
    /// A successful zone outcome.
    pub fn completed(
        zone: ZoneId,
        changes: Vec<ZoneChange>,
        cursor: ChangeCursor,
        more_coming: bool,
    ) -> Self {
        Self {
            zone,
            changes,
            cursor: Some(cursor),
            more_coming,
            error: None,
        }
    }

    /// A failed zone outcome.
    pub fn failed(zone: ZoneId, error: RemoteError) -> Self {
        Self {
            zone,
            changes: Vec::new(),
            cursor: None,
            more_coming: false,
            error: Some(error),
        }
    }
}

/// Result of a batched write/delete.
///
/// A batch may partially succeed: `saved` and `deleted` list what the server
/// confirmed, and `error` (a partial failure) describes the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyOutcome {
    /// Records as stored by the server, with fresh change tags.
    pub saved: Vec<Record>,
    /// Identifiers the server confirmed as deleted.
    pub deleted: Vec<RecordId>,
    /// Failure covering the items that were not applied.
    pub error: Option<RemoteError>,
}
