//! Record type for stored values.

use crate::error::Error;
use rkyv::{Archive, Deserialize, Serialize};

/// A stored row with metadata.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Record {
    /// Encoded field data (see [`crate::codec`]).
    pub data: Vec<u8>,

    /// Creation timestamp in microseconds since Unix epoch.
    pub created_at: u64,

    /// Last update timestamp in microseconds since Unix epoch.
    pub updated_at: u64,
}

impl Record {
    /// Create a new record with the current timestamp.
    pub fn new(data: Vec<u8>) -> Self {
        let now = super::key::current_timestamp();
        Self {
            data,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create the next revision of this record, keeping its creation time.
    pub fn revise(&self, data: Vec<u8>) -> Self {
        Self {
            data,
            created_at: self.created_at,
            updated_at: super::key::current_timestamp().max(self.updated_at),
        }
    }

    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_roundtrip() {
        let record = Record::new(vec![1, 2, 3, 4, 5]);
        let bytes = record.to_bytes().unwrap();
        let decoded = Record::from_bytes(&bytes).unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn test_revise_keeps_created_at() {
        let record = Record {
            data: vec![1],
            created_at: 10,
            updated_at: 10,
        };
        let revised = record.revise(vec![2]);
        assert_eq!(revised.created_at, 10);
        assert!(revised.updated_at >= 10);
        assert_eq!(revised.data, vec![2]);
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(Record::from_bytes(&[0xff, 0x00, 0x13]).is_err());
    }
}
