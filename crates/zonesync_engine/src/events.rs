//! Typed cache change notifications.

use tokio::sync::broadcast;
use zonesync_protocol::{DatabaseScope, RecordId, ZoneId};

/// What changed in the cache during one sync or write.
///
/// Exactly one event is emitted per logical unit of work that changed the
/// cache; units that changed nothing emit nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordsChanged {
    /// Database the change applies to.
    pub database: DatabaseScope,
    /// Zones whose records were purged wholesale.
    pub purged_zones: Vec<ZoneId>,
    /// Records inserted or replaced.
    pub upserted: Vec<RecordId>,
    /// Records removed.
    pub deleted: Vec<RecordId>,
}

impl RecordsChanged {
    /// An empty change set.
    pub fn new(database: DatabaseScope) -> Self {
        Self {
            database,
            purged_zones: Vec::new(),
            upserted: Vec::new(),
            deleted: Vec::new(),
        }
    }

    /// Returns true if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.purged_zones.is_empty() && self.upserted.is_empty() && self.deleted.is_empty()
    }
}

/// Broadcasts [`RecordsChanged`] events to any number of subscribers.
pub(crate) struct EventBus {
    tx: broadcast::Sender<RecordsChanged>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity.max(1)).0,
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<RecordsChanged> {
        self.tx.subscribe()
    }

    /// Emits the change set unless it is empty.
    pub(crate) fn emit(&self, change: RecordsChanged) {
        if change.is_empty() {
            return;
        }
        // No subscribers is fine.
        let _ = self.tx.send(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_changes_are_not_emitted() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.emit(RecordsChanged::new(DatabaseScope::Private));
        assert!(rx.try_recv().is_err());

        let mut change = RecordsChanged::new(DatabaseScope::Private);
        change.purged_zones.push(ZoneId::owned("todos"));
        bus.emit(change.clone());
        assert_eq!(rx.try_recv().unwrap(), change);
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::new(1);
        let mut change = RecordsChanged::new(DatabaseScope::Shared);
        change.upserted.push(RecordId::new(ZoneId::owned("todos"), "a"));
        bus.emit(change);
    }
}
