//! Index entries enforcing unique constraints.

use crate::error::{ConstraintError, Error};
use crate::storage::key::decode_id;
use crate::storage::{StoreRead, Transaction};
use lms_proto::{EntityId, Value};

use super::keys::{encode_value, key_prefix};

/// Key kind for unique entries.
const KIND: &[u8] = b"u";

/// A unique constraint's view of the index tree.
///
/// Key format: `u 0x00 entity 0x00 constraint 0x00 (encoded value)*` -> owner id
pub struct UniqueIndex<'a> {
    entity: &'a str,
    constraint: &'a str,
    fields: &'a [String],
}

impl<'a> UniqueIndex<'a> {
    /// View the index for one constraint.
    pub fn new(entity: &'a str, constraint: &'a str, fields: &'a [String]) -> Self {
        Self {
            entity,
            constraint,
            fields,
        }
    }

    /// Fields covered by the constraint.
    pub fn fields(&self) -> &[String] {
        self.fields
    }

    /// Build the index key for the given values.
    pub fn key(&self, values: &[&Value]) -> Vec<u8> {
        let mut key = key_prefix(KIND, self.entity);
        key.extend_from_slice(self.constraint.as_bytes());
        key.push(0);
        for value in values {
            encode_value(&mut key, value);
        }
        key
    }

    /// Look up the row holding a unique value.
    pub fn lookup(
        &self,
        reader: &impl StoreRead,
        values: &[&Value],
    ) -> Result<Option<EntityId>, Error> {
        Ok(reader
            .read_index(&self.key(values))?
            .and_then(|bytes| decode_id(&bytes)))
    }

    /// Check if a unique value is available (absent or held by `exclude_id`).
    pub fn check_unique(
        &self,
        reader: &impl StoreRead,
        values: &[&Value],
        exclude_id: Option<EntityId>,
    ) -> Result<bool, Error> {
        match self.lookup(reader, values)? {
            Some(owner) => Ok(Some(owner) == exclude_id),
            None => Ok(true),
        }
    }

    /// The error reported when `values` are already taken.
    pub fn violation(&self, values: &[&Value]) -> ConstraintError {
        ConstraintError::UniqueViolation {
            constraint: self.constraint.to_string(),
            entity: self.entity.to_string(),
            fields: self.fields.to_vec(),
            value: values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Queue a claim of `values` for `owner`.
    pub fn claim(&self, tx: &mut Transaction<'_>, values: &[&Value], owner: EntityId) {
        tx.index_insert_unique(self.key(values), owner, self.violation(values));
    }

    /// Queue the release of `values`.
    pub fn release(&self, tx: &mut Transaction<'_>, values: &[&Value]) {
        tx.index_remove(self.key(values));
    }
}
