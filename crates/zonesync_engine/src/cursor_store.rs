//! Change cursor bookkeeping.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use zonesync_protocol::{ChangeCursor, DatabaseScope, ZoneId};

/// Last-seen change cursors, per database and per zone.
///
/// Besides cursors, the store remembers which zones were reported as changed
/// by a database fetch but have not yet been drained by a zone fetch. A zone
/// stays pending across failed or cancelled syncs, so advancing the database
/// cursor never loses a zone change.
#[derive(Debug, Default, Clone)]
pub struct CursorStore {
    databases: HashMap<DatabaseScope, ChangeCursor>,
    zones: HashMap<(DatabaseScope, ZoneId), ChangeCursor>,
    pending: HashMap<DatabaseScope, BTreeSet<ZoneId>>,
}

impl CursorStore {
    /// Creates an empty store; every fetch starts from the beginning.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the database-level cursor.
    pub fn database_cursor(&self, database: DatabaseScope) -> Option<ChangeCursor> {
        self.databases.get(&database).cloned()
    }

    /// Stores the database-level cursor.
    pub fn set_database_cursor(&mut self, database: DatabaseScope, cursor: ChangeCursor) {
        self.databases.insert(database, cursor);
    }

    /// Returns the cursor of a zone.
    pub fn zone_cursor(&self, database: DatabaseScope, zone: &ZoneId) -> Option<ChangeCursor> {
        self.zones.get(&(database, zone.clone())).cloned()
    }

    /// Stores the cursor of a zone.
    pub fn set_zone_cursor(&mut self, database: DatabaseScope, zone: ZoneId, cursor: ChangeCursor) {
        self.zones.insert((database, zone), cursor);
    }

    /// Drops the cursor of a zone and forgets it as pending.
    ///
    /// The caller purges the zone's cached records in the same critical
    /// section. Returns true if a cursor was dropped.
    pub fn invalidate_zone(&mut self, database: DatabaseScope, zone: &ZoneId) -> bool {
        if let Some(pending) = self.pending.get_mut(&database) {
            pending.remove(zone);
        }
        self.zones.remove(&(database, zone.clone())).is_some()
    }

    /// Drops every cursor, forcing a full fetch of every database and zone.
    pub fn invalidate_all(&mut self) {
        self.databases.clear();
        self.zones.clear();
        self.pending.clear();
    }

    /// Marks a zone as changed but not yet fetched.
    pub fn mark_pending(&mut self, database: DatabaseScope, zone: ZoneId) {
        self.pending.entry(database).or_default().insert(zone);
    }

    /// Marks a zone as fully fetched.
    pub fn clear_pending(&mut self, database: DatabaseScope, zone: &ZoneId) {
        if let Some(pending) = self.pending.get_mut(&database) {
            pending.remove(zone);
        }
    }

    /// Zones waiting for a zone fetch, in a stable order.
    pub fn pending_zones(&self, database: DatabaseScope) -> Vec<ZoneId> {
        self.pending
            .get(&database)
            .map(|zones| zones.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Copies the store into a serializable snapshot.
    pub fn snapshot(&self) -> CursorSnapshot {
        let mut snapshot = CursorSnapshot {
            databases: self.databases.iter().map(|(d, c)| (*d, c.clone())).collect(),
            zones: self
                .zones
                .iter()
                .map(|((d, z), c)| (*d, z.clone(), c.clone()))
                .collect(),
            pending: self
                .pending
                .iter()
                .flat_map(|(d, zones)| zones.iter().map(move |z| (*d, z.clone())))
                .collect(),
        };
        snapshot.databases.sort_by_key(|(d, _)| *d);
        snapshot.zones.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        snapshot.pending.sort();
        snapshot
    }

    /// Rebuilds a store from a snapshot.
    pub fn restore(snapshot: CursorSnapshot) -> Self {
        let mut store = Self::new();
        for (database, cursor) in snapshot.databases {
            store.set_database_cursor(database, cursor);
        }
        for (database, zone, cursor) in snapshot.zones {
            store.set_zone_cursor(database, zone, cursor);
        }
        for (database, zone) in snapshot.pending {
            store.mark_pending(database, zone);
        }
        store
    }
}

/// Serializable copy of a [`CursorStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorSnapshot {
    /// Database-level cursors.
    pub databases: Vec<(DatabaseScope, ChangeCursor)>,
    /// Zone-level cursors.
    pub zones: Vec<(DatabaseScope, ZoneId, ChangeCursor)>,
    /// Zones awaiting a zone fetch.
    pub pending: Vec<(DatabaseScope, ZoneId)>,
}
