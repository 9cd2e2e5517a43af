//! Field-level reconciliation of version conflicts.

use crate::record::Record;
use std::collections::BTreeSet;

/// Three-way merge of a conflicting record.
///
/// The result starts from `server` (and keeps its change tag, so it can be
/// resubmitted). Every field the client changed relative to `ancestor`,
/// including removals, takes the client's value; all other fields keep the
/// server's value. Without an ancestor, every field present on the client
/// wins and nothing is removed.
pub fn merge_fields(ancestor: Option<&Record>, client: &Record, server: &Record) -> Record {
    let mut merged = server.clone();

    let Some(ancestor) = ancestor else {
        for (name, value) in &client.fields {
            merged.fields.insert(name.clone(), value.clone());
        }
        if client.parent.is_some() {
            merged.parent = client.parent.clone();
        }
        return merged;
    };

    let names: BTreeSet<&String> = client.fields.keys().chain(ancestor.fields.keys()).collect();
    for name in names {
        let mine = client.fields.get(name);
        if mine == ancestor.fields.get(name) {
            continue;
        }
        match mine {
            Some(value) => {
                merged.fields.insert(name.clone(), value.clone());
            }
            None => {
                merged.fields.remove(name);
            }
        }
    }

    if client.parent != ancestor.parent {
        merged.parent = client.parent.clone();
    }

    merged
}
