//! Row key and id encoding.

use lms_proto::EntityId;
use std::fmt;

/// Size of an encoded id in bytes.
pub const ID_SIZE: usize = 8;

/// Separator between key components.
pub const SEPARATOR: u8 = 0;

/// Key of a stored row.
///
/// Key format: `[entity name][0x00][id (8 bytes, order-preserving)]`
///
/// Ids are encoded big-endian with the sign bit flipped so lexicographic
/// order matches numeric order, and a prefix scan over one entity yields
/// its rows in id order.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    /// Entity type name.
    pub entity: String,
    /// Row identity.
    pub id: EntityId,
}

impl RowKey {
    /// Create a new row key.
    pub fn new(entity: impl Into<String>, id: EntityId) -> Self {
        Self {
            entity: entity.into(),
            id,
        }
    }

    /// Encode the key to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Self::prefix(&self.entity);
        buf.extend_from_slice(&encode_id(self.id));
        buf
    }

    /// Decode a key from bytes.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < ID_SIZE + 1 {
            return None;
        }
        let split = bytes.len() - ID_SIZE;
        if bytes[split - 1] != SEPARATOR {
            return None;
        }
        let entity = std::str::from_utf8(&bytes[..split - 1]).ok()?;
        let id = decode_id(&bytes[split..])?;
        Some(Self::new(entity, id))
    }

    /// Get the prefix for scanning all rows of an entity.
    pub fn prefix(entity: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(entity.len() + 1 + ID_SIZE);
        buf.extend_from_slice(entity.as_bytes());
        buf.push(SEPARATOR);
        buf
    }
}

impl fmt::Debug for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.id)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.entity, self.id)
    }
}

/// Encode an id so byte order matches numeric order.
pub fn encode_id(id: EntityId) -> [u8; ID_SIZE] {
    ((id as u64) ^ (1 << 63)).to_be_bytes()
}

/// Decode an id written by [`encode_id`].
pub fn decode_id(bytes: &[u8]) -> Option<EntityId> {
    let buf: [u8; ID_SIZE] = bytes.try_into().ok()?;
    Some((u64::from_be_bytes(buf) ^ (1 << 63)) as EntityId)
}

/// Get current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let key = RowKey::new("Lesson", 42);
        let decoded = RowKey::decode(&key.encode()).unwrap();
        assert_eq!(key, decoded);
    }

    #[test]
    fn test_id_ordering() {
        let ids = [-5i64, 0, 1, 2, 255, 256, i64::MAX];
        let encoded: Vec<_> = ids.iter().map(|id| encode_id(*id)).collect();
        assert!(encoded.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_prefix_isolates_entities() {
        // "User" must not match rows of "UserX".
        let user = RowKey::prefix("User");
        let other = RowKey::new("UserX", 1).encode();
        assert!(!other.starts_with(&user));
        assert!(RowKey::new("User", 1).encode().starts_with(&user));
    }

    #[test]
    fn test_decode_invalid() {
        assert!(RowKey::decode(&[1, 2, 3]).is_none());
        assert!(decode_id(&[0u8; 4]).is_none());
    }
}
