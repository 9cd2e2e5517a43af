//! Share object construction.

use crate::ids::RecordId;
use crate::record::{FieldValue, Record, RecordReference, RecordType};

/// Field of a share holding a reference to its root record.
pub const SHARE_ROOT_FIELD: &str = "root";

/// Field of a share holding its display title.
pub const SHARE_TITLE_FIELD: &str = "title";

/// Builds a new share for `root`.
///
/// Returns the root with its `share` reference pointing at the new share, and
/// the share itself, created in the root's zone. Both must be written in the
/// same atomic batch.
pub fn build_share(root: &Record, title: impl Into<String>) -> (Record, Record) {
    let share_id = RecordId::new(
        root.id.zone.clone(),
        format!("Share-{}", uuid::Uuid::new_v4()),
    );

    let share = Record::new(share_id.clone(), RecordType::Share)
        .with_field(
            SHARE_ROOT_FIELD,
            FieldValue::Reference(RecordReference::weak(root.id.clone())),
        )
        .with_field(SHARE_TITLE_FIELD, FieldValue::String(title.into()));

    let mut root = root.clone();
    root.share = Some(RecordReference::weak(share_id));

    (root, share)
}
