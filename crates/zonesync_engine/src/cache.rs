//! In-memory record cache.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use zonesync_protocol::{DatabaseScope, Record, RecordId, RecordType, ZoneId};

/// A cached record together with the database it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRecord {
    /// Database holding the record.
    pub database: DatabaseScope,
    /// Last server-confirmed state of the record.
    pub record: Record,
}

/// Locally known records, keyed by `(database, record id)`.
///
/// The cache never emits change notifications; the component that mutates it
/// emits one event per logical sync or write.
#[derive(Debug, Default)]
pub struct RecordCache {
    entries: HashMap<(DatabaseScope, RecordId), Record>,
}

impl RecordCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, atomically replacing any entry with the same key.
    ///
    /// Returns the superseded record.
    pub fn upsert(&mut self, database: DatabaseScope, record: Record) -> Option<Record> {
        self.entries.insert((database, record.id.clone()), record)
    }

    /// Removes a record. Removing an absent record is a no-op.
    pub fn remove(&mut self, database: DatabaseScope, id: &RecordId) -> Option<Record> {
        self.entries.remove(&(database, id.clone()))
    }

    /// Drops every record of a zone, returning the removed identifiers.
    pub fn purge_zone(&mut self, database: DatabaseScope, zone: &ZoneId) -> Vec<RecordId> {
        let doomed: Vec<(DatabaseScope, RecordId)> = self
            .entries
            .keys()
            .filter(|(db, id)| *db == database && &id.zone == zone)
            .cloned()
            .collect();

        doomed
            .into_iter()
            .map(|key| {
                self.entries.remove(&key);
                key.1
            })
            .collect()
    }

    /// Empties the cache.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Looks up a record.
    pub fn get(&self, database: DatabaseScope, id: &RecordId) -> Option<&Record> {
        self.entries.get(&(database, id.clone()))
    }

    /// Returns the identifiers of every record of a zone.
    pub fn ids_in_zone(&self, database: DatabaseScope, zone: &ZoneId) -> Vec<RecordId> {
        self.entries
            .keys()
            .filter(|(db, id)| *db == database && &id.zone == zone)
            .map(|(_, id)| id.clone())
            .collect()
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All records of one type, in unspecified order.
    pub fn of_type(&self, record_type: &RecordType) -> Vec<CachedRecord> {
        self.entries
            .iter()
            .filter(|(_, record)| &record.record_type == record_type)
            .map(|((database, _), record)| CachedRecord {
                database: *database,
                record: record.clone(),
            })
            .collect()
    }

    /// All cached lists.
    pub fn lists(&self) -> Vec<CachedRecord> {
        self.of_type(&RecordType::List)
    }

    /// All cached todos.
    pub fn todos(&self) -> Vec<CachedRecord> {
        self.of_type(&RecordType::Todo)
    }

    /// All cached shares.
    pub fn shares(&self) -> Vec<CachedRecord> {
        self.of_type(&RecordType::Share)
    }

    /// Every cached record.
    pub fn entries(&self) -> Vec<CachedRecord> {
        self.entries
            .iter()
            .map(|((database, _), record)| CachedRecord {
                database: *database,
                record: record.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use zonesync_protocol::{ChangeTag, FieldValue};

    fn record(zone: &str, name: &str, ty: RecordType) -> Record {
        Record::new(RecordId::new(ZoneId::owned(zone), name), ty)
    }

    #[test]
    fn upsert_supersedes() {
        let mut cache = RecordCache::new();
        let first = record("todos", "a", RecordType::List)
            .with_field("title", FieldValue::String("Old".into()));
        let mut second = first.clone();
        second.set_field("title", FieldValue::String("New".into()));
        second.change_tag = Some(ChangeTag::new("2"));

        assert!(cache.upsert(DatabaseScope::Private, first.clone()).is_none());
        assert_eq!(cache.upsert(DatabaseScope::Private, second.clone()), Some(first));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(DatabaseScope::Private, &second.id), Some(&second));
    }

    #[test]
    fn same_id_in_different_databases_is_distinct() {
        let mut cache = RecordCache::new();
        let r = record("todos", "a", RecordType::Todo);
        cache.upsert(DatabaseScope::Private, r.clone());
        cache.upsert(DatabaseScope::Shared, r.clone());
        assert_eq!(cache.len(), 2);

        cache.remove(DatabaseScope::Shared, &r.id);
        assert!(cache.get(DatabaseScope::Private, &r.id).is_some());
    }

    #[test]
    fn remove_missing_is_noop() {
        let mut cache = RecordCache::new();
        let id = RecordId::new(ZoneId::owned("todos"), "ghost");
        assert!(cache.remove(DatabaseScope::Private, &id).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn projections_filter_by_type() {
        let mut cache = RecordCache::new();
        cache.upsert(DatabaseScope::Private, record("todos", "l", RecordType::List));
        cache.upsert(DatabaseScope::Private, record("todos", "t1", RecordType::Todo));
        cache.upsert(DatabaseScope::Shared, record("todos", "t2", RecordType::Todo));
        cache.upsert(DatabaseScope::Private, record("todos", "s", RecordType::Share));

        assert_eq!(cache.lists().len(), 1);
        assert_eq!(cache.todos().len(), 2);
        assert_eq!(cache.shares().len(), 1);
        assert!(cache
            .todos()
            .iter()
            .any(|c| c.database == DatabaseScope::Shared));
    }

    #[test]
    fn purge_zone_is_scoped_and_idempotent() {
        let mut cache = RecordCache::new();
        cache.upsert(DatabaseScope::Private, record("todos", "a", RecordType::List));
        cache.upsert(DatabaseScope::Private, record("todos", "b", RecordType::Todo));
        cache.upsert(DatabaseScope::Private, record("other", "c", RecordType::Todo));
        cache.upsert(DatabaseScope::Shared, record("todos", "d", RecordType::Todo));

        let zone = ZoneId::owned("todos");
        let mut removed = cache.purge_zone(DatabaseScope::Private, &zone);
        removed.sort();
        assert_eq!(removed.len(), 2);
        assert_eq!(cache.len(), 2);

        assert!(cache.purge_zone(DatabaseScope::Private, &zone).is_empty());
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Upsert(u8, u8),
        Remove(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..6, any::<u8>()).prop_map(|(k, v)| Op::Upsert(k, v)),
            (0u8..6).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn latest_upsert_wins(ops in proptest::collection::vec(op(), 0..64)) {
            let mut cache = RecordCache::new();
            let mut model: BTreeMap<u8, u8> = BTreeMap::new();
            let id = |k: u8| RecordId::new(ZoneId::owned("todos"), format!("r{k}"));

            for op in ops {
                match op {
                    Op::Upsert(k, v) => {
                        let r = Record::new(id(k), RecordType::Todo)
                            .with_field("v", FieldValue::Bytes(vec![v]));
                        cache.upsert(DatabaseScope::Private, r);
                        model.insert(k, v);
                    }
                    Op::Remove(k) => {
                        cache.remove(DatabaseScope::Private, &id(k));
                        model.remove(&k);
                    }
                }
            }

            prop_assert_eq!(cache.len(), model.len());
            for (k, v) in model {
                let stored = cache.get(DatabaseScope::Private, &id(k)).unwrap();
                prop_assert_eq!(stored.field("v"), Some(&FieldValue::Bytes(vec![v])));
            }
        }
    }
}
