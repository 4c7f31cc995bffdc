//! Transaction support for atomic multi-tree operations.

use std::collections::{BTreeMap, HashMap};

use super::key::{decode_id, encode_id, RowKey};
use super::{Record, StorageEngine};
use crate::error::{ConstraintError, Error};
use lms_proto::EntityId;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::Transactional;
use tracing::debug;

/// A pending operation in a transaction.
#[derive(Debug, Clone)]
pub enum TransactionOp {
    /// Write a row.
    Put {
        /// Row key.
        key: RowKey,
        /// Record data.
        record: Record,
    },
    /// Remove a row.
    Remove {
        /// Row key.
        key: RowKey,
    },
    /// Write a secondary index entry.
    IndexInsert {
        /// Encoded index key.
        key: Vec<u8>,
        /// Entry payload.
        value: Vec<u8>,
    },
    /// Claim a unique index entry for `owner`, failing if another row holds it.
    IndexInsertUnique {
        /// Encoded index key.
        key: Vec<u8>,
        /// Row claiming the key.
        owner: EntityId,
        /// Error reported when the key is taken.
        conflict: ConstraintError,
    },
    /// Remove a secondary index entry.
    IndexRemove {
        /// Encoded index key.
        key: Vec<u8>,
    },
}

/// A transaction for atomic multi-key operations.
///
/// Operations are buffered and applied in a single sled transaction over the
/// data, index and meta trees on commit. Reads through the transaction see its
/// own uncommitted writes.
pub struct Transaction<'a> {
    engine: &'a StorageEngine,
    ops: Vec<TransactionOp>,
    /// Uncommitted row writes (`None` marks a removal).
    write_cache: HashMap<RowKey, Option<Record>>,
    /// Uncommitted index writes, ordered for prefix scans.
    index_cache: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    /// Highest id handed out per entity in this transaction.
    sequences: HashMap<String, EntityId>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(engine: &'a StorageEngine) -> Self {
        Self {
            engine,
            ops: Vec::new(),
            write_cache: HashMap::new(),
            index_cache: BTreeMap::new(),
            sequences: HashMap::new(),
        }
    }

    /// Queue a row write.
    pub fn put(&mut self, entity: impl Into<String>, id: EntityId, record: Record) -> &mut Self {
        let key = RowKey::new(entity, id);
        self.write_cache.insert(key.clone(), Some(record.clone()));
        self.ops.push(TransactionOp::Put { key, record });
        self
    }

    /// Queue a row removal.
    pub fn remove(&mut self, entity: impl Into<String>, id: EntityId) -> &mut Self {
        let key = RowKey::new(entity, id);
        self.write_cache.insert(key.clone(), None);
        self.ops.push(TransactionOp::Remove { key });
        self
    }

    /// Read a row, preferring this transaction's own writes.
    pub fn get(&self, entity: &str, id: EntityId) -> Result<Option<Record>, Error> {
        if let Some(cached) = self.write_cache.get(&RowKey::new(entity, id)) {
            return Ok(cached.clone());
        }
        self.engine.get(entity, id)
    }

    /// Check whether a row exists, preferring this transaction's own writes.
    pub fn exists(&self, entity: &str, id: EntityId) -> Result<bool, Error> {
        if let Some(cached) = self.write_cache.get(&RowKey::new(entity, id)) {
            return Ok(cached.is_some());
        }
        self.engine.exists(entity, id)
    }

    /// Queue an index entry write.
    pub fn index_insert(&mut self, key: Vec<u8>, value: Vec<u8>) -> &mut Self {
        self.index_cache.insert(key.clone(), Some(value.clone()));
        self.ops.push(TransactionOp::IndexInsert { key, value });
        self
    }

    /// Queue a unique index claim. The claim is re-checked at commit.
    pub fn index_insert_unique(
        &mut self,
        key: Vec<u8>,
        owner: EntityId,
        conflict: ConstraintError,
    ) -> &mut Self {
        self.index_cache
            .insert(key.clone(), Some(encode_id(owner).to_vec()));
        self.ops.push(TransactionOp::IndexInsertUnique {
            key,
            owner,
            conflict,
        });
        self
    }

    /// Queue an index entry removal.
    pub fn index_remove(&mut self, key: Vec<u8>) -> &mut Self {
        self.index_cache.insert(key.clone(), None);
        self.ops.push(TransactionOp::IndexRemove { key });
        self
    }

    /// Read an index entry, preferring this transaction's own writes.
    pub fn index_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        if let Some(cached) = self.index_cache.get(key) {
            return Ok(cached.clone());
        }
        self.engine.index_get(key)
    }

    /// Scan index entries under a prefix, merged with this transaction's writes.
    pub fn scan_index_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
        let mut merged = BTreeMap::new();
        for entry in self.engine.scan_index_prefix(prefix) {
            let (key, value) = entry?;
            merged.insert(key, value);
        }

        for (key, value) in self.index_cache.range(prefix.to_vec()..) {
            if !key.starts_with(prefix) {
                break;
            }
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }

    /// Allocate the next id for an entity.
    pub fn allocate_id(&mut self, entity: &str) -> Result<EntityId, Error> {
        let current = match self.sequences.get(entity) {
            Some(id) => *id,
            None => self.engine.current_sequence(entity)?,
        };
        let next = current + 1;
        self.sequences.insert(entity.to_string(), next);
        Ok(next)
    }

    /// Ensure the entity's sequence is at least `id` so later allocations skip it.
    pub fn advance_sequence(&mut self, entity: &str, id: EntityId) -> Result<(), Error> {
        let current = match self.sequences.get(entity) {
            Some(current) => *current,
            None => self.engine.current_sequence(entity)?,
        };
        if id > current {
            self.sequences.insert(entity.to_string(), id);
        }
        Ok(())
    }

    /// Get the pending operations.
    pub fn operations(&self) -> &[TransactionOp] {
        &self.ops
    }

    /// Get the number of pending operations.
    pub fn operation_count(&self) -> usize {
        self.ops.len()
    }

    /// Commit the transaction atomically.
    ///
    /// All operations succeed or none do. Unique index claims are re-checked
    /// against the committed state and abort the transaction on conflict.
    pub fn commit(self) -> Result<(), Error> {
        if self.ops.is_empty() && self.sequences.is_empty() {
            return Ok(());
        }

        let data_tree = self.engine.data_tree();
        let index_tree = self.engine.index_tree();
        let meta_tree = self.engine.meta_tree();

        let result: Result<(), TransactionError<Error>> =
            (data_tree, index_tree, meta_tree).transaction(|(data_tx, index_tx, meta_tx)| {
                for op in &self.ops {
                    Self::execute_op(data_tx, index_tx, op)?;
                }
                for (entity, id) in &self.sequences {
                    Self::execute_sequence(meta_tx, entity, *id)?;
                }
                Ok(())
            });

        match result {
            Ok(()) => {
                debug!(ops = self.ops.len(), "transaction committed");
                Ok(())
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(Error::Storage(e)),
        }
    }

    /// Rollback the transaction (discard all pending operations).
    pub fn rollback(self) {
        drop(self.ops);
    }

    fn execute_op(
        data_tx: &TransactionalTree,
        index_tx: &TransactionalTree,
        op: &TransactionOp,
    ) -> Result<(), ConflictableTransactionError<Error>> {
        match op {
            TransactionOp::Put { key, record } => {
                let value = record
                    .to_bytes()
                    .map_err(ConflictableTransactionError::Abort)?;
                data_tx.insert(key.encode(), value)?;
            }
            TransactionOp::Remove { key } => {
                data_tx.remove(key.encode())?;
            }
            TransactionOp::IndexInsert { key, value } => {
                index_tx.insert(key.as_slice(), value.as_slice())?;
            }
            TransactionOp::IndexInsertUnique {
                key,
                owner,
                conflict,
            } => {
                if let Some(existing) = index_tx.get(key.as_slice())? {
                    if decode_id(&existing) != Some(*owner) {
                        return Err(ConflictableTransactionError::Abort(
                            Error::ConstraintViolation(conflict.clone()),
                        ));
                    }
                }
                index_tx.insert(key.as_slice(), &encode_id(*owner))?;
            }
            TransactionOp::IndexRemove { key } => {
                index_tx.remove(key.as_slice())?;
            }
        }
        Ok(())
    }

    fn execute_sequence(
        meta_tx: &TransactionalTree,
        entity: &str,
        id: EntityId,
    ) -> Result<(), ConflictableTransactionError<Error>> {
        let key = StorageEngine::sequence_key(entity);
        let stored = meta_tx
            .get(key.as_slice())?
            .and_then(|bytes| decode_id(&bytes))
            .unwrap_or(0);
        if id > stored {
            meta_tx.insert(key, &encode_id(id))?;
        }
        Ok(())
    }
}

impl StorageEngine {
    /// Begin a new transaction.
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageConfig;

    fn test_engine() -> StorageEngine {
        StorageEngine::open(StorageConfig::temporary()).unwrap()
    }

    fn conflict() -> ConstraintError {
        ConstraintError::UniqueViolation {
            constraint: "user_email".into(),
            entity: "User".into(),
            fields: vec!["email".into()],
            value: "a@x.com".into(),
        }
    }

    #[test]
    fn test_transaction_commit() {
        let engine = test_engine();

        let mut tx = engine.transaction();
        tx.put("User", 1, Record::new(vec![1]));
        tx.put("User", 2, Record::new(vec![2]));
        tx.index_insert(b"i:1".to_vec(), vec![]);
        tx.commit().unwrap();

        assert!(engine.exists("User", 1).unwrap());
        assert!(engine.exists("User", 2).unwrap());
        assert!(engine.index_get(b"i:1").unwrap().is_some());
    }

    #[test]
    fn test_transaction_rollback() {
        let engine = test_engine();

        let mut tx = engine.transaction();
        tx.put("User", 1, Record::new(vec![1]));
        tx.allocate_id("User").unwrap();
        tx.rollback();

        assert!(!engine.exists("User", 1).unwrap());
        assert_eq!(engine.current_sequence("User").unwrap(), 0);
    }

    #[test]
    fn test_dropped_transaction_writes_nothing() {
        let engine = test_engine();
        {
            let mut tx = engine.transaction();
            tx.put("User", 1, Record::new(vec![1]));
        }
        assert!(!engine.exists("User", 1).unwrap());
    }

    #[test]
    fn test_read_your_writes() {
        let engine = test_engine();

        let mut tx = engine.transaction();
        tx.put("Course", 5, Record::new(vec![5]));
        assert!(tx.exists("Course", 5).unwrap());
        assert_eq!(tx.get("Course", 5).unwrap().unwrap().data, vec![5]);
        tx.remove("Course", 5);
        assert!(!tx.exists("Course", 5).unwrap());
        assert!(tx.get("Course", 5).unwrap().is_none());
    }

    #[test]
    fn test_scan_index_prefix_merges_pending() {
        let engine = test_engine();

        let mut tx = engine.transaction();
        tx.index_insert(b"r:a:1".to_vec(), vec![]);
        tx.index_insert(b"r:a:2".to_vec(), vec![]);
        tx.commit().unwrap();

        let mut tx = engine.transaction();
        tx.index_remove(b"r:a:1".to_vec());
        tx.index_insert(b"r:a:3".to_vec(), vec![]);
        tx.index_insert(b"r:b:1".to_vec(), vec![]);

        let keys: Vec<Vec<u8>> = tx
            .scan_index_prefix(b"r:a:")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"r:a:2".to_vec(), b"r:a:3".to_vec()]);
    }

    #[test]
    fn test_unique_claim_conflict_aborts_everything() {
        let engine = test_engine();

        let mut tx = engine.transaction();
        tx.put("User", 1, Record::new(vec![1]));
        tx.index_insert_unique(b"u:email:a".to_vec(), 1, conflict());
        tx.commit().unwrap();

        let mut tx = engine.transaction();
        tx.put("User", 2, Record::new(vec![2]));
        tx.index_insert_unique(b"u:email:a".to_vec(), 2, conflict());
        let err = tx.commit().unwrap_err();
        assert!(matches!(
            err,
            Error::ConstraintViolation(ConstraintError::UniqueViolation { .. })
        ));

        // The row written alongside the failed claim was not committed.
        assert!(!engine.exists("User", 2).unwrap());
    }

    #[test]
    fn test_unique_claim_by_same_owner_is_idempotent() {
        let engine = test_engine();

        let mut tx = engine.transaction();
        tx.index_insert_unique(b"u:k".to_vec(), 1, conflict());
        tx.commit().unwrap();

        let mut tx = engine.transaction();
        tx.index_insert_unique(b"u:k".to_vec(), 1, conflict());
        tx.commit().unwrap();
    }

    #[test]
    fn test_unique_claim_after_release_in_same_tx() {
        let engine = test_engine();

        let mut tx = engine.transaction();
        tx.index_insert_unique(b"u:k".to_vec(), 1, conflict());
        tx.commit().unwrap();

        let mut tx = engine.transaction();
        tx.index_remove(b"u:k".to_vec());
        tx.index_insert_unique(b"u:k".to_vec(), 2, conflict());
        tx.commit().unwrap();

        assert_eq!(
            engine.index_get(b"u:k").unwrap().and_then(|v| decode_id(&v)),
            Some(2)
        );
    }

    #[test]
    fn test_sequences() {
        let engine = test_engine();

        let mut tx = engine.transaction();
        assert_eq!(tx.allocate_id("User").unwrap(), 1);
        assert_eq!(tx.allocate_id("User").unwrap(), 2);
        assert_eq!(tx.allocate_id("Course").unwrap(), 1);
        tx.commit().unwrap();
        assert_eq!(engine.current_sequence("User").unwrap(), 2);

        let mut tx = engine.transaction();
        tx.advance_sequence("User", 10).unwrap();
        tx.advance_sequence("User", 4).unwrap();
        assert_eq!(tx.allocate_id("User").unwrap(), 11);
        tx.commit().unwrap();
        assert_eq!(engine.current_sequence("User").unwrap(), 11);
    }

    #[test]
    fn test_empty_transaction() {
        let engine = test_engine();
        engine.transaction().commit().unwrap();
    }
}
