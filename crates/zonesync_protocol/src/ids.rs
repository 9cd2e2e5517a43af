//! Database, zone and record identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner name the remote store uses for zones owned by the current user.
pub const DEFAULT_OWNER: &str = "__defaultOwner__";

/// Name of the zone every database has before any custom zone is created.
pub const DEFAULT_ZONE_NAME: &str = "_defaultZone";

/// One of the databases of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DatabaseScope {
    /// The current user's private database.
    Private,
    /// Zones other users have shared with the current user.
    Shared,
    /// The container-wide public database.
    Public,
}

impl DatabaseScope {
    /// All scopes, in a stable order.
    pub const ALL: [DatabaseScope; 3] = [
        DatabaseScope::Private,
        DatabaseScope::Shared,
        DatabaseScope::Public,
    ];

    /// Returns the lowercase scope name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DatabaseScope::Private => "private",
            DatabaseScope::Shared => "shared",
            DatabaseScope::Public => "public",
        }
    }
}

impl fmt::Display for DatabaseScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a zone (named partition) within a database.
///
/// Zones in the shared database keep the owner of the sharing user, so two
/// zones may share a name and still be distinct.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ZoneId {
    /// Zone name.
    pub name: String,
    /// Owner of the zone.
    pub owner: String,
}

impl ZoneId {
    /// Creates a zone identifier with an explicit owner.
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
        }
    }

    /// Creates a zone owned by the current user.
    pub fn owned(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_OWNER)
    }

    /// The default zone of a database.
    pub fn default_zone() -> Self {
        Self::owned(DEFAULT_ZONE_NAME)
    }

    /// Returns true if this is the default zone.
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_ZONE_NAME
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.name)
    }
}

/// Identifier of a record, scoped to a zone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId {
    /// Zone holding the record.
    pub zone: ZoneId,
    /// Record name, unique within the zone.
    pub name: String,
}

impl RecordId {
    /// Creates a record identifier.
    pub fn new(zone: ZoneId, name: impl Into<String>) -> Self {
        Self {
            zone,
            name: name.into(),
        }
    }

    /// Creates a record identifier with a random UUID name.
    pub fn generate(zone: ZoneId) -> Self {
        Self::new(zone, uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.zone, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zones_with_same_name_differ_by_owner() {
        let mine = ZoneId::owned("todos");
        let theirs = ZoneId::new("todos", "_8f2c");
        assert_ne!(mine, theirs);
        assert_eq!(mine.owner, DEFAULT_OWNER);
    }

    #[test]
    fn generated_record_names_are_unique() {
        let zone = ZoneId::owned("todos");
        let a = RecordId::generate(zone.clone());
        let b = RecordId::generate(zone);
        assert_ne!(a, b);
    }

    #[test]
    fn display_formats() {
        let id = RecordId::new(ZoneId::owned("todos"), "abc");
        assert_eq!(id.to_string(), "__defaultOwner__:todos/abc");
        assert_eq!(DatabaseScope::Shared.to_string(), "shared");
        assert!(ZoneId::default_zone().is_default());
    }
}
