//! Index entries tracking which child rows reference a parent row.

use crate::error::Error;
use crate::storage::key::{decode_id, encode_id, ID_SIZE};
use crate::storage::{StoreRead, Transaction};
use lms_proto::EntityId;

use super::keys::key_prefix;

/// Key kind for reference entries.
const KIND: &[u8] = b"r";

/// Reverse lookup from parent rows to their dependents, per relation.
///
/// Key format: `r 0x00 relation 0x00 parent_id child_id` -> empty
pub struct ReferenceIndex;

impl ReferenceIndex {
    /// Prefix covering every dependent of `parent` through `relation`.
    pub fn prefix(relation: &str, parent: EntityId) -> Vec<u8> {
        let mut key = key_prefix(KIND, relation);
        key.extend_from_slice(&encode_id(parent));
        key
    }

    /// Key of one reference entry.
    pub fn key(relation: &str, parent: EntityId, child: EntityId) -> Vec<u8> {
        let mut key = Self::prefix(relation, parent);
        key.extend_from_slice(&encode_id(child));
        key
    }

    /// Queue a reference from `child` to `parent`.
    pub fn link(tx: &mut Transaction<'_>, relation: &str, parent: EntityId, child: EntityId) {
        tx.index_insert(Self::key(relation, parent, child), Vec::new());
    }

    /// Queue removal of a reference.
    pub fn unlink(tx: &mut Transaction<'_>, relation: &str, parent: EntityId, child: EntityId) {
        tx.index_remove(Self::key(relation, parent, child));
    }

    /// List the ids of rows referencing `parent` through `relation`, ascending.
    pub fn dependents(
        reader: &impl StoreRead,
        relation: &str,
        parent: EntityId,
    ) -> Result<Vec<EntityId>, Error> {
        let prefix = Self::prefix(relation, parent);
        reader
            .scan_index(&prefix)?
            .into_iter()
            .map(|(key, _)| {
                key.get(prefix.len()..)
                    .filter(|rest| rest.len() == ID_SIZE)
                    .and_then(decode_id)
                    .ok_or(Error::InvalidKey)
            })
            .collect()
    }

    /// Count rows referencing `parent` through `relation`.
    pub fn count(reader: &impl StoreRead, relation: &str, parent: EntityId) -> Result<usize, Error> {
        Ok(reader.scan_index(&Self::prefix(relation, parent))?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageConfig, StorageEngine};

    #[test]
    fn test_link_and_list() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();

        let mut tx = engine.transaction();
        ReferenceIndex::link(&mut tx, "lesson_course", 1, 12);
        ReferenceIndex::link(&mut tx, "lesson_course", 1, 3);
        ReferenceIndex::link(&mut tx, "lesson_course", 2, 4);
        ReferenceIndex::link(&mut tx, "assignment_course", 1, 5);
        tx.commit().unwrap();

        assert_eq!(
            ReferenceIndex::dependents(&engine, "lesson_course", 1).unwrap(),
            vec![3, 12]
        );
        assert_eq!(ReferenceIndex::count(&engine, "lesson_course", 2).unwrap(), 1);
        assert_eq!(ReferenceIndex::count(&engine, "assignment_course", 2).unwrap(), 0);
    }

    #[test]
    fn test_unlink_within_transaction() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();

        let mut tx = engine.transaction();
        ReferenceIndex::link(&mut tx, "course_teacher", 7, 1);
        tx.commit().unwrap();

        let mut tx = engine.transaction();
        ReferenceIndex::unlink(&mut tx, "course_teacher", 7, 1);
        assert_eq!(ReferenceIndex::count(&tx, "course_teacher", 7).unwrap(), 0);
        // Not yet committed.
        assert_eq!(ReferenceIndex::count(&engine, "course_teacher", 7).unwrap(), 1);
        tx.commit().unwrap();
        assert_eq!(ReferenceIndex::count(&engine, "course_teacher", 7).unwrap(), 0);
    }
}
