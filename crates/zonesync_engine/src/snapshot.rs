//! Persistable engine state.
//!
//! A snapshot carries the cache together with the cursors that describe it,
//! so a host can persist both across launches and resume with delta syncs.
//! Snapshots are encoded as CBOR.

use crate::cache::CachedRecord;
use crate::cursor_store::CursorSnapshot;
use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use zonesync_protocol::ZoneId;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Cache, cursors and known zone captured at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Format version.
    pub version: u32,
    /// Every cached record.
    pub records: Vec<CachedRecord>,
    /// Cursors covering `records`.
    pub cursors: CursorSnapshot,
    /// Zone new private records are created in.
    pub well_known_zone: Option<ZoneId>,
}

impl EngineSnapshot {
    /// Creates a snapshot of the current format version.
    pub fn new(
        records: Vec<CachedRecord>,
        cursors: CursorSnapshot,
        well_known_zone: Option<ZoneId>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            records,
            cursors,
            well_known_zone,
        }
    }

    /// Encodes the snapshot as CBOR.
    pub fn encode(&self) -> SyncResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes).map_err(|e| SyncError::Snapshot(e.to_string()))?;
        Ok(bytes)
    }

    /// Decodes a CBOR snapshot.
    pub fn decode(bytes: &[u8]) -> SyncResult<Self> {
        let snapshot: Self =
            ciborium::from_reader(bytes).map_err(|e| SyncError::Snapshot(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SyncError::Snapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }
}
