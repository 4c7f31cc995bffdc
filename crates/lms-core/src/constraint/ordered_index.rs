//! Non-unique composite indexes for ordered retrieval.

use crate::catalog::IndexDef;
use crate::error::Error;
use crate::storage::key::{decode_id, encode_id, ID_SIZE};
use crate::storage::{StoreRead, Transaction};
use lms_proto::{EntityId, Value};

use super::keys::{encode_value, key_prefix};

/// Key kind for ordered entries.
const KIND: &[u8] = b"o";

static NULL: Value = Value::Null;

/// An ordered index over one or more fields.
///
/// Key format: `o 0x00 index 0x00 (encoded value)* row_id` -> empty
///
/// Scanning with the leading field values fixed yields row ids ordered by the
/// remaining fields, then by id.
pub struct OrderedIndex<'a> {
    def: &'a IndexDef,
}

impl<'a> OrderedIndex<'a> {
    /// View the entries of an index definition.
    pub fn new(def: &'a IndexDef) -> Self {
        Self { def }
    }

    /// Index name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Prefix covering every entry whose leading fields equal `leading`.
    pub fn prefix(&self, leading: &[Value]) -> Vec<u8> {
        let mut key = key_prefix(KIND, &self.def.name);
        for value in leading {
            encode_value(&mut key, value);
        }
        key
    }

    /// Key of the entry for `row` (which must hold every indexed field).
    pub fn key(&self, row: &[(String, Value)], id: EntityId) -> Vec<u8> {
        let mut key = key_prefix(KIND, &self.def.name);
        for field in &self.def.fields {
            let value = row
                .iter()
                .find(|(name, _)| name == field)
                .map(|(_, v)| v)
                .unwrap_or(&NULL);
            encode_value(&mut key, value);
        }
        key.extend_from_slice(&encode_id(id));
        key
    }

    /// Queue the entry for a row.
    pub fn insert(&self, tx: &mut Transaction<'_>, row: &[(String, Value)], id: EntityId) {
        tx.index_insert(self.key(row, id), Vec::new());
    }

    /// Queue removal of the entry for a row.
    pub fn remove(&self, tx: &mut Transaction<'_>, row: &[(String, Value)], id: EntityId) {
        tx.index_remove(self.key(row, id));
    }

    /// Row ids whose leading fields equal `leading`, in index order.
    pub fn scan(&self, reader: &impl StoreRead, leading: &[Value]) -> Result<Vec<EntityId>, Error> {
        if leading.len() > self.def.fields.len() {
            return Err(Error::InvalidData(format!(
                "index '{}' has {} field(s), got {} value(s)",
                self.def.name,
                self.def.fields.len(),
                leading.len()
            )));
        }

        reader
            .scan_index(&self.prefix(leading))?
            .into_iter()
            .map(|(key, _)| {
                key.len()
                    .checked_sub(ID_SIZE)
                    .and_then(|at| decode_id(&key[at..]))
                    .ok_or(Error::InvalidKey)
            })
            .collect()
    }
}
