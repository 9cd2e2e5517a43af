//! Remote records and their field values.

use crate::ids::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Type tag of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// A todo list.
    List,
    /// A single todo item, usually parented by a list.
    Todo,
    /// A share object granting other users access to a record hierarchy.
    Share,
    /// Any other type the remote store reports.
    Unknown(String),
}

impl RecordType {
    /// Remote type name of share objects.
    pub const SHARE_TYPE_NAME: &'static str = "cloudkit.share";

    /// Parses a remote type name.
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "List" => RecordType::List,
            "Todo" => RecordType::Todo,
            Self::SHARE_TYPE_NAME => RecordType::Share,
            other => RecordType::Unknown(other.to_string()),
        }
    }

    /// Returns the remote type name.
    pub fn type_name(&self) -> &str {
        match self {
            RecordType::List => "List",
            RecordType::Todo => "Todo",
            RecordType::Share => Self::SHARE_TYPE_NAME,
            RecordType::Unknown(name) => name,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// What happens to a referencing record when its target is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceAction {
    /// Nothing; the reference dangles.
    None,
    /// The referencing record is deleted with its target.
    DeleteSelf,
}

/// A reference from one record to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordReference {
    /// Target record.
    pub id: RecordId,
    /// Delete behavior.
    pub action: ReferenceAction,
}

impl RecordReference {
    /// A reference that does not cascade deletes.
    pub fn weak(id: RecordId) -> Self {
        Self {
            id,
            action: ReferenceAction::None,
        }
    }

    /// A reference that deletes the referencing record with its target.
    pub fn cascading(id: RecordId) -> Self {
        Self {
            id,
            action: ReferenceAction::DeleteSelf,
        }
    }
}

/// Value of a named record field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Text.
    String(String),
    /// Point in time.
    Date(DateTime<Utc>),
    /// Opaque bytes.
    Bytes(Vec<u8>),
    /// Reference to another record.
    Reference(RecordReference),
}

impl FieldValue {
    /// Returns the text value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the date value, if this is a date.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the bytes, if this is a byte blob.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the reference, if this is a reference.
    pub fn as_reference(&self) -> Option<&RecordReference> {
        match self {
            FieldValue::Reference(r) => Some(r),
            _ => None,
        }
    }
}

/// Opaque, server-assigned version marker of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeTag(pub String);

impl ChangeTag {
    /// Creates a change tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the raw tag.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A typed, field-bearing remote entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Zone-scoped identifier.
    pub id: RecordId,
    /// Type tag.
    pub record_type: RecordType,
    /// Named field values, ordered by name.
    pub fields: BTreeMap<String, FieldValue>,
    /// Parent record, used for hierarchical deletes and sharing.
    pub parent: Option<RecordReference>,
    /// Share object covering this record, if it is the root of a share.
    pub share: Option<RecordReference>,
    /// Server version marker. `None` until the record has been saved.
    pub change_tag: Option<ChangeTag>,
}

impl Record {
    /// Creates an unsaved record with no fields.
    pub fn new(id: RecordId, record_type: RecordType) -> Self {
        Self {
            id,
            record_type,
            fields: BTreeMap::new(),
            parent: None,
            share: None,
            change_tag: None,
        }
    }

    /// Sets a field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Sets the parent, builder style.
    pub fn with_parent(mut self, parent: RecordReference) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Returns a field value.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Sets a field, returning the previous value.
    pub fn set_field(&mut self, name: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(name.into(), value)
    }

    /// Returns true if this record is a share object.
    pub fn is_share(&self) -> bool {
        self.record_type == RecordType::Share
    }

    /// Returns true if the server has confirmed this record at least once.
    pub fn is_saved(&self) -> bool {
        self.change_tag.is_some()
    }
}
