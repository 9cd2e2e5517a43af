//! Per-zone record storage and change log.

use std::collections::{BTreeMap, HashMap};
use zonesync_protocol::{ChangeTag, Record, RecordType};

/// A record-level change log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogEntry {
    pub(crate) seq: u64,
    pub(crate) name: String,
    /// Type of the record at the time of the change.
    pub(crate) record_type: RecordType,
}

/// A stored record with every version it has had, keyed by change tag.
#[derive(Debug, Clone)]
pub(crate) struct StoredRecord {
    pub(crate) current: Record,
    pub(crate) history: HashMap<ChangeTag, Record>,
}

/// Records of one zone plus the log of changes to them.
///
/// The log is never compacted, so a zone can always be replayed from the
/// start of its generation.
#[derive(Debug, Clone)]
pub(crate) struct ZoneState {
    pub(crate) generation: u64,
    pub(crate) records: BTreeMap<String, StoredRecord>,
    log: Vec<LogEntry>,
    next_seq: u64,
}

/// One page of record-level changes.
#[derive(Debug)]
pub(crate) struct ZonePage {
    /// Changed names in log order, deduplicated, with their logged type.
    pub(crate) names: Vec<(String, RecordType)>,
    pub(crate) last_seq: u64,
    pub(crate) more_coming: bool,
}

impl ZoneState {
    pub(crate) fn new(generation: u64) -> Self {
        Self {
            generation,
            records: BTreeMap::new(),
            log: Vec::new(),
            next_seq: 1,
        }
    }

    /// Highest sequence number handed out.
    pub(crate) fn head(&self) -> u64 {
        self.next_seq - 1
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Record> {
        self.records.get(name).map(|stored| &stored.current)
    }

    /// Stores a tagged record version and logs the change.
    pub(crate) fn store(&mut self, record: Record) {
        let name = record.id.name.clone();
        let record_type = record.record_type.clone();
        let stored = self
            .records
            .entry(name.clone())
            .or_insert_with(|| StoredRecord {
                current: record.clone(),
                history: HashMap::new(),
            });
        if let Some(tag) = &record.change_tag {
            stored.history.insert(tag.clone(), record.clone());
        }
        stored.current = record;
        self.append(name, record_type);
    }

    /// Removes a record and logs the deletion.
    pub(crate) fn remove(&mut self, name: &str) -> Option<Record> {
        let stored = self.records.remove(name)?;
        self.append(name.to_string(), stored.current.record_type.clone());
        Some(stored.current)
    }

    /// Version of a record as of the given change tag.
    pub(crate) fn version(&self, name: &str, tag: &ChangeTag) -> Option<&Record> {
        self.records.get(name)?.history.get(tag)
    }

    /// Changes after `since`, at most `limit` log entries.
    pub(crate) fn changes_since(&self, since: u64, limit: usize) -> ZonePage {
        let pending: Vec<&LogEntry> = self.log.iter().filter(|e| e.seq > since).collect();
        let page = &pending[..pending.len().min(limit)];

        let mut names: Vec<(String, RecordType)> = Vec::new();
        for entry in page {
            names.retain(|(name, _)| name != &entry.name);
            names.push((entry.name.clone(), entry.record_type.clone()));
        }

        ZonePage {
            names,
            last_seq: page.last().map_or(since.max(self.head()), |e| e.seq),
            more_coming: pending.len() > page.len(),
        }
    }

    fn append(&mut self, name: String, record_type: RecordType) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.log.push(LogEntry {
            seq,
            name,
            record_type,
        });
    }
}
