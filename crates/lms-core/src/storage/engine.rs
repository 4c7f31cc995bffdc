//! Storage engine implementation.

use super::key::{decode_id, RowKey};
use super::{Record, StorageConfig};
use crate::error::Error;
use lms_proto::EntityId;
use sled::{Db, Tree};

/// Tree name for entity rows.
const DATA_TREE: &str = "data";

/// Tree name for secondary index entries.
const INDEX_TREE: &str = "index";

/// Tree name for metadata (id sequences).
const META_TREE: &str = "meta";

/// Prefix for id sequence counters in the meta tree.
const SEQUENCE_PREFIX: &[u8] = b"seq:";

/// The main storage engine wrapping sled.
pub struct StorageEngine {
    db: Db,
    data_tree: Tree,
    index_tree: Tree,
    meta_tree: Tree,
}

impl StorageEngine {
    /// Open or create a storage engine with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        let data_tree = db.open_tree(DATA_TREE)?;
        let index_tree = db.open_tree(INDEX_TREE)?;
        let meta_tree = db.open_tree(META_TREE)?;

        Ok(Self {
            db,
            data_tree,
            index_tree,
            meta_tree,
        })
    }

    /// Check if the database was recovered from a previous crash.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    /// Get a row.
    pub fn get(&self, entity: &str, id: EntityId) -> Result<Option<Record>, Error> {
        match self.data_tree.get(RowKey::new(entity, id).encode())? {
            Some(bytes) => Ok(Some(Record::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Check whether a row exists.
    pub fn exists(&self, entity: &str, id: EntityId) -> Result<bool, Error> {
        Ok(self
            .data_tree
            .contains_key(RowKey::new(entity, id).encode())?)
    }

    /// Scan all rows of an entity in id order.
    pub fn scan_entity(
        &self,
        entity: &str,
    ) -> impl Iterator<Item = Result<(EntityId, Record), Error>> + '_ {
        let prefix = RowKey::prefix(entity);
        let prefix_len = prefix.len();

        self.data_tree.scan_prefix(prefix).map(move |result| {
            let (key, value) = result?;
            let id = decode_id(&key[prefix_len..]).ok_or(Error::InvalidKey)?;
            Ok((id, Record::from_bytes(&value)?))
        })
    }

    /// Count rows of an entity.
    pub fn count_entity(&self, entity: &str) -> Result<usize, Error> {
        let mut count = 0;
        for result in self.data_tree.scan_prefix(RowKey::prefix(entity)).keys() {
            result?;
            count += 1;
        }
        Ok(count)
    }

    /// Get a single index entry.
    pub fn index_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.index_tree.get(key)?.map(|v| v.to_vec()))
    }

    /// Scan index entries sharing a prefix, in key order.
    pub fn scan_index_prefix(
        &self,
        prefix: &[u8],
    ) -> impl Iterator<Item = Result<(Vec<u8>, Vec<u8>), Error>> + '_ {
        self.index_tree
            .scan_prefix(prefix)
            .map(|result| {
                let (key, value) = result?;
                Ok((key.to_vec(), value.to_vec()))
            })
    }

    /// Get the last id handed out for an entity (0 when none).
    pub fn current_sequence(&self, entity: &str) -> Result<EntityId, Error> {
        match self.meta_tree.get(Self::sequence_key(entity))? {
            Some(bytes) => decode_id(&bytes).ok_or(Error::InvalidKey),
            None => Ok(0),
        }
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    /// Get database size in bytes.
    pub fn size_on_disk(&self) -> Result<u64, Error> {
        Ok(self.db.size_on_disk()?)
    }

    /// Meta tree key holding an entity's id sequence.
    pub(crate) fn sequence_key(entity: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(SEQUENCE_PREFIX.len() + entity.len());
        key.extend_from_slice(SEQUENCE_PREFIX);
        key.extend_from_slice(entity.as_bytes());
        key
    }

    pub(crate) fn data_tree(&self) -> &Tree {
        &self.data_tree
    }

    pub(crate) fn index_tree(&self) -> &Tree {
        &self.index_tree
    }

    pub(crate) fn meta_tree(&self) -> &Tree {
        &self.meta_tree
    }

    /// Get the underlying sled database.
    pub fn db(&self) -> &Db {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_engine() -> StorageEngine {
        StorageEngine::open(StorageConfig::temporary()).unwrap()
    }

    #[test]
    fn test_put_and_get() {
        let engine = test_engine();

        let mut tx = engine.transaction();
        tx.put("User", 1, Record::new(vec![1, 2, 3]));
        tx.commit().unwrap();

        let record = engine.get("User", 1).unwrap().unwrap();
        assert_eq!(record.data, vec![1, 2, 3]);
        assert!(engine.exists("User", 1).unwrap());
        assert!(!engine.exists("User", 2).unwrap());
        assert!(engine.get("Course", 1).unwrap().is_none());
    }

    #[test]
    fn test_scan_entity_in_id_order() {
        let engine = test_engine();

        let mut tx = engine.transaction();
        for id in [3, 1, 2, 300] {
            tx.put("Lesson", id, Record::new(vec![id as u8]));
        }
        tx.put("LessonNote", 1, Record::new(vec![9]));
        tx.commit().unwrap();

        let ids: Vec<EntityId> = engine
            .scan_entity("Lesson")
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 300]);
        assert_eq!(engine.count_entity("Lesson").unwrap(), 4);
        assert_eq!(engine.count_entity("LessonNote").unwrap(), 1);
    }

    #[test]
    fn test_sequence_starts_at_zero() {
        let engine = test_engine();
        assert_eq!(engine.current_sequence("User").unwrap(), 0);
    }

    #[test]
    fn test_persistence() {
        let dir = TempDir::new().unwrap();

        {
            let engine = StorageEngine::open(StorageConfig::new(dir.path()).with_flush_every_ms(None)).unwrap();
            let mut tx = engine.transaction();
            let id = tx.allocate_id("Course").unwrap();
            tx.put("Course", id, Record::new(vec![7]));
            tx.commit().unwrap();
            engine.flush().unwrap();
        }

        let engine = StorageEngine::open(StorageConfig::new(dir.path()).with_flush_every_ms(None)).unwrap();
        assert_eq!(engine.current_sequence("Course").unwrap(), 1);
        assert_eq!(engine.get("Course", 1).unwrap().unwrap().data, vec![7]);
    }
}
