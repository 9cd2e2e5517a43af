//! Closed schemas for the record types the engine creates.
//!
//! New records are built from a validated draft rather than from an untyped
//! field map. The same field names are used to read typed values back out of
//! records fetched from the remote store.

use crate::ids::RecordId;
use crate::record::{FieldValue, Record, RecordReference, RecordType};
use chrono::{DateTime, Utc};
use thiserror::Error;

const TITLE: &str = "title";
const NOTES: &str = "notes";
const DUE: &str = "dueDate";
const ATTACHMENT: &str = "attachment";

/// Errors raised while validating or reading typed records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A required text field is blank.
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    /// A required field is missing or has the wrong value type.
    #[error("record {id} has no valid `{field}` field")]
    MissingField {
        /// Record identifier.
        id: String,
        /// Field name.
        field: &'static str,
    },

    /// The record is not of the expected type.
    #[error("expected a {expected} record, found {found}")]
    WrongType {
        /// Expected type name.
        expected: String,
        /// Actual type name.
        found: String,
    },
}

fn require_title(title: impl Into<String>) -> Result<String, SchemaError> {
    let title = title.into().trim().to_string();
    if title.is_empty() {
        return Err(SchemaError::EmptyField(TITLE));
    }
    Ok(title)
}

/// A new todo list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDraft {
    title: String,
}

impl ListDraft {
    /// Creates a list draft. The title is trimmed and must not be empty.
    pub fn new(title: impl Into<String>) -> Result<Self, SchemaError> {
        Ok(Self {
            title: require_title(title)?,
        })
    }

    /// Returns the title.
    pub fn title(&self) -> &str {
        &self.title
    }
}

/// A new todo item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoDraft {
    title: String,
    notes: Option<String>,
    due: Option<DateTime<Utc>>,
    attachment: Option<Vec<u8>>,
}

impl TodoDraft {
    /// Creates a todo draft. The title is trimmed and must not be empty.
    pub fn new(title: impl Into<String>) -> Result<Self, SchemaError> {
        Ok(Self {
            title: require_title(title)?,
            notes: None,
            due: None,
            attachment: None,
        })
    }

    /// Attaches free-form notes. Blank notes are dropped.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        self.notes = (!notes.trim().is_empty()).then_some(notes);
        self
    }

    /// Sets the due date.
    pub fn with_due(mut self, due: DateTime<Utc>) -> Self {
        self.due = Some(due);
        self
    }

    /// Attaches a binary blob (e.g. an image).
    pub fn with_attachment(mut self, bytes: Vec<u8>) -> Self {
        self.attachment = Some(bytes);
        self
    }

    /// Returns the title.
    pub fn title(&self) -> &str {
        &self.title
    }
}

/// A validated draft of any creatable record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDraft {
    /// A list.
    List(ListDraft),
    /// A todo item.
    Todo(TodoDraft),
}

impl RecordDraft {
    /// Type tag of the record this draft builds.
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordDraft::List(_) => RecordType::List,
            RecordDraft::Todo(_) => RecordType::Todo,
        }
    }

    /// Builds an unsaved record with the given identifier and parent.
    pub fn into_record(self, id: RecordId, parent: Option<RecordReference>) -> Record {
        let mut record = Record::new(id, self.record_type());
        record.parent = parent;
        match self {
            RecordDraft::List(list) => {
                record.set_field(TITLE, FieldValue::String(list.title));
            }
            RecordDraft::Todo(todo) => {
                record.set_field(TITLE, FieldValue::String(todo.title));
                if let Some(notes) = todo.notes {
                    record.set_field(NOTES, FieldValue::String(notes));
                }
                if let Some(due) = todo.due {
                    record.set_field(DUE, FieldValue::Date(due));
                }
                if let Some(bytes) = todo.attachment {
                    record.set_field(ATTACHMENT, FieldValue::Bytes(bytes));
                }
            }
        }
        record
    }
}

impl From<ListDraft> for RecordDraft {
    fn from(draft: ListDraft) -> Self {
        RecordDraft::List(draft)
    }
}

impl From<TodoDraft> for RecordDraft {
    fn from(draft: TodoDraft) -> Self {
        RecordDraft::Todo(draft)
    }
}

fn expect_type(record: &Record, expected: RecordType) -> Result<(), SchemaError> {
    if record.record_type == expected {
        return Ok(());
    }
    Err(SchemaError::WrongType {
        expected: expected.type_name().to_string(),
        found: record.record_type.type_name().to_string(),
    })
}

fn read_title(record: &Record) -> Result<String, SchemaError> {
    record
        .field(TITLE)
        .and_then(FieldValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| SchemaError::MissingField {
            id: record.id.to_string(),
            field: TITLE,
        })
}

/// Typed view of a list record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFields {
    /// List title.
    pub title: String,
}

impl ListFields {
    /// Reads the typed fields of a list record.
    pub fn from_record(record: &Record) -> Result<Self, SchemaError> {
        expect_type(record, RecordType::List)?;
        Ok(Self {
            title: read_title(record)?,
        })
    }
}

/// Typed view of a todo record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoFields {
    /// Todo title.
    pub title: String,
    /// Optional notes.
    pub notes: Option<String>,
    /// Optional due date.
    pub due: Option<DateTime<Utc>>,
    /// Optional attachment.
    pub attachment: Option<Vec<u8>>,
    /// Owning list, taken from the record's parent.
    pub list: Option<RecordId>,
}

impl TodoFields {
    /// Reads the typed fields of a todo record.
    pub fn from_record(record: &Record) -> Result<Self, SchemaError> {
        expect_type(record, RecordType::Todo)?;
        Ok(Self {
            title: read_title(record)?,
            notes: record
                .field(NOTES)
                .and_then(FieldValue::as_str)
                .map(str::to_string),
            due: record.field(DUE).and_then(FieldValue::as_date),
            attachment: record
                .field(ATTACHMENT)
                .and_then(FieldValue::as_bytes)
                .map(<[u8]>::to_vec),
            list: record.parent.as_ref().map(|p| p.id.clone()),
        })
    }
}
