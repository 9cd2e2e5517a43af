//! Cursor encoding.
//!
//! Database cursors are `D | epoch | seq`, zone cursors are
//! `Z | epoch | generation | seq`, all integers big-endian `u64`. The epoch
//! changes when the database's tokens are expired; the generation changes
//! when a zone is purged or recreated.

use zonesync_protocol::ChangeCursor;

const DATABASE_TAG: u8 = b'D';
const ZONE_TAG: u8 = b'Z';

/// Position in a database-level change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DatabasePosition {
    pub(crate) epoch: u64,
    pub(crate) seq: u64,
}

/// Position in a zone's record log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ZonePosition {
    pub(crate) epoch: u64,
    pub(crate) generation: u64,
    pub(crate) seq: u64,
}

impl DatabasePosition {
    pub(crate) fn encode(self) -> ChangeCursor {
        let mut bytes = Vec::with_capacity(17);
        bytes.push(DATABASE_TAG);
        bytes.extend_from_slice(&self.epoch.to_be_bytes());
        bytes.extend_from_slice(&self.seq.to_be_bytes());
        ChangeCursor::from_bytes(bytes)
    }

    pub(crate) fn decode(cursor: &ChangeCursor) -> Option<Self> {
        let bytes = cursor.as_bytes();
        if bytes.len() != 17 || bytes[0] != DATABASE_TAG {
            return None;
        }
        Some(Self {
            epoch: read_u64(&bytes[1..9])?,
            seq: read_u64(&bytes[9..17])?,
        })
    }
}

impl ZonePosition {
    pub(crate) fn encode(self) -> ChangeCursor {
        let mut bytes = Vec::with_capacity(25);
        bytes.push(ZONE_TAG);
        bytes.extend_from_slice(&self.epoch.to_be_bytes());
        bytes.extend_from_slice(&self.generation.to_be_bytes());
        bytes.extend_from_slice(&self.seq.to_be_bytes());
        ChangeCursor::from_bytes(bytes)
    }

    pub(crate) fn decode(cursor: &ChangeCursor) -> Option<Self> {
        let bytes = cursor.as_bytes();
        if bytes.len() != 25 || bytes[0] != ZONE_TAG {
            return None;
        }
        Some(Self {
            epoch: read_u64(&bytes[1..9])?,
            generation: read_u64(&bytes[9..17])?,
            seq: read_u64(&bytes[17..25])?,
        })
    }
}

fn read_u64(bytes: &[u8]) -> Option<u64> {
    bytes.try_into().ok().map(u64::from_be_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_cursor_roundtrip() {
        let position = DatabasePosition { epoch: 3, seq: 42 };
        assert_eq!(DatabasePosition::decode(&position.encode()), Some(position));
    }

    #[test]
    fn cursor_kinds_are_not_interchangeable() {
        let zone = ZonePosition {
            epoch: 1,
            generation: 2,
            seq: 3,
        };
        assert_eq!(ZonePosition::decode(&zone.encode()), Some(zone));
        assert_eq!(DatabasePosition::decode(&zone.encode()), None);
        assert_eq!(
            ZonePosition::decode(&ChangeCursor::from_bytes(b"junk".to_vec())),
            None
        );
    }
}
