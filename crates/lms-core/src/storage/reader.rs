//! Read access shared by the engine and open transactions.

use super::{Record, StorageEngine, Transaction};
use crate::error::Error;
use lms_proto::EntityId;

/// Point reads and index scans.
///
/// Implemented by [`StorageEngine`] (committed state) and [`Transaction`]
/// (committed state overlaid with the transaction's pending writes), so index
/// helpers work the same way inside and outside a write.
pub trait StoreRead {
    /// Read a row.
    fn read_row(&self, entity: &str, id: EntityId) -> Result<Option<Record>, Error>;

    /// Read a single index entry.
    fn read_index(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error>;

    /// Read all index entries under a prefix, in key order.
    fn scan_index(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error>;
}

impl StoreRead for StorageEngine {
    fn read_row(&self, entity: &str, id: EntityId) -> Result<Option<Record>, Error> {
        self.get(entity, id)
    }

    fn read_index(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        self.index_get(key)
    }

    fn scan_index(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
        self.scan_index_prefix(prefix).collect()
    }
}

impl StoreRead for Transaction<'_> {
    fn read_row(&self, entity: &str, id: EntityId) -> Result<Option<Record>, Error> {
        self.get(entity, id)
    }

    fn read_index(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        self.index_get(key)
    }

    fn scan_index(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
        self.scan_index_prefix(prefix)
    }
}
