//! Per-database state: zones and the zone-level change log.

use crate::zone::ZoneState;
use std::collections::{BTreeMap, HashMap};
use zonesync_protocol::{RecordId, RecordReference, ReferenceAction, ZoneChangeKind, ZoneId};

/// One page of database-level changes.
#[derive(Debug)]
pub(crate) struct DatabasePage {
    pub(crate) zones: Vec<(ZoneId, ZoneChangeKind)>,
    pub(crate) last_seq: u64,
    pub(crate) more_coming: bool,
}

/// Zones of one database and the log of zone-level changes.
#[derive(Debug)]
pub(crate) struct DatabaseState {
    /// Bumped when every outstanding cursor of the database is expired.
    pub(crate) epoch: u64,
    pub(crate) zones: BTreeMap<ZoneId, ZoneState>,
    pub(crate) subscribed: bool,
    log: Vec<(u64, ZoneId, ZoneChangeKind)>,
    next_seq: u64,
}

impl DatabaseState {
    /// A database holding only the default zone.
    pub(crate) fn new(default_zone_generation: u64) -> Self {
        let mut zones = BTreeMap::new();
        zones.insert(ZoneId::default_zone(), ZoneState::new(default_zone_generation));
        Self {
            epoch: 1,
            zones,
            subscribed: false,
            log: Vec::new(),
            next_seq: 1,
        }
    }

    pub(crate) fn head(&self) -> u64 {
        self.next_seq - 1
    }

    /// Appends a zone-level change.
    pub(crate) fn log_zone(&mut self, zone: &ZoneId, kind: ZoneChangeKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.log.push((seq, zone.clone(), kind));
    }

    /// Zone-level changes after `since`, at most `limit` log entries.
    ///
    /// Repeats of the same kind for a zone are collapsed; a zone that was
    /// purged and then changed again is reported both ways, in order.
    pub(crate) fn changes_since(&self, since: u64, limit: usize) -> DatabasePage {
        let pending: Vec<&(u64, ZoneId, ZoneChangeKind)> =
            self.log.iter().filter(|(seq, _, _)| *seq > since).collect();
        let page = &pending[..pending.len().min(limit)];

        let mut zones = Vec::new();
        let mut last_kind: HashMap<&ZoneId, ZoneChangeKind> = HashMap::new();
        for (_, zone, kind) in page.iter().copied() {
            if last_kind.insert(zone, *kind) != Some(*kind) {
                zones.push((zone.clone(), *kind));
            }
        }

        DatabasePage {
            zones,
            last_seq: page.last().map_or(since.max(self.head()), |(seq, _, _)| *seq),
            more_coming: pending.len() > page.len(),
        }
    }

    pub(crate) fn record_exists(&self, id: &RecordId) -> bool {
        self.zones
            .get(&id.zone)
            .is_some_and(|zone| zone.get(&id.name).is_some())
    }

    /// Deletes a record and every record whose cascading parent chain leads
    /// to it. Returns the ids removed; an absent record yields nothing.
    pub(crate) fn delete_cascade(&mut self, id: &RecordId) -> Vec<RecordId> {
        let mut removed = Vec::new();
        let mut queue = vec![id.clone()];

        while let Some(next) = queue.pop() {
            let Some(zone) = self.zones.get_mut(&next.zone) else {
                continue;
            };
            if zone.remove(&next.name).is_none() {
                continue;
            }

            queue.extend(
                zone.records
                    .values()
                    .filter(|stored| is_child_of(stored.current.parent.as_ref(), &next))
                    .map(|stored| stored.current.id.clone()),
            );
            self.log_zone(&next.zone, ZoneChangeKind::Changed);
            removed.push(next);
        }
        removed
    }
}

fn is_child_of(parent: Option<&RecordReference>, id: &RecordId) -> bool {
    parent.is_some_and(|p| p.action == ReferenceAction::DeleteSelf && &p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonesync_protocol::{ChangeTag, Record, RecordType};

    fn zone() -> ZoneId {
        ZoneId::owned("todos")
    }

    fn record(name: &str, parent: Option<&str>) -> Record {
        let mut record = Record::new(RecordId::new(zone(), name), RecordType::Todo);
        record.parent = parent.map(|p| RecordReference::cascading(RecordId::new(zone(), p)));
        record.change_tag = Some(ChangeTag::new(format!("t-{name}")));
        record
    }

    #[test]
    fn repeated_changes_collapse() {
        let mut db = DatabaseState::new(1);
        let z = zone();
        db.log_zone(&z, ZoneChangeKind::Changed);
        db.log_zone(&z, ZoneChangeKind::Changed);
        db.log_zone(&z, ZoneChangeKind::Purged);
        db.log_zone(&z, ZoneChangeKind::Changed);

        let page = db.changes_since(0, 10);
        assert_eq!(
            page.zones,
            vec![
                (z.clone(), ZoneChangeKind::Changed),
                (z.clone(), ZoneChangeKind::Purged),
                (z, ZoneChangeKind::Changed),
            ]
        );
        assert_eq!(page.last_seq, 4);
        assert!(!page.more_coming);
        assert!(db.changes_since(4, 10).zones.is_empty());
    }

    #[test]
    fn cascade_follows_parent_chain() {
        let mut db = DatabaseState::new(1);
        let mut todos = ZoneState::new(2);
        todos.store(record("list", None));
        todos.store(record("todo", Some("list")));
        todos.store(record("subtask", Some("todo")));
        todos.store(record("other", None));
        db.zones.insert(zone(), todos);

        let mut removed = db.delete_cascade(&RecordId::new(zone(), "list"));
        removed.sort();
        let names: Vec<_> = removed.iter().map(|id| id.name.as_str()).collect();
        assert_eq!(names, vec!["list", "subtask", "todo"]);
        assert!(db.record_exists(&RecordId::new(zone(), "other")));
        assert!(db.delete_cascade(&RecordId::new(zone(), "list")).is_empty());
    }
}
