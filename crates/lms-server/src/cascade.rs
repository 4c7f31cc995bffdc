//! Cascade planning for deletes.
//!
//! Deleting a row removes, depth-first, every row reachable through CASCADE
//! relations. The plan lists rows children first so each row is removed after
//! everything that references it. A RESTRICT relation still holding a
//! dependent outside the plan rejects the whole delete.

use std::collections::HashSet;

use tracing::debug;

use lms_core::{CascadeError, ConstraintValidator, ReferenceIndex, RowKey, SchemaBundle, StoreRead};
use lms_proto::EntityId;

use crate::error::Error;

/// Maximum cascade depth to prevent runaway recursion.
pub const MAX_CASCADE_DEPTH: usize = 100;

/// Rows removed by one delete, children before parents. The root is last.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletePlan {
    rows: Vec<RowKey>,
}

impl DeletePlan {
    /// All rows to remove, in removal order.
    pub fn rows(&self) -> &[RowKey] {
        &self.rows
    }

    /// The row the delete was requested for.
    pub fn root(&self) -> Option<&RowKey> {
        self.rows.last()
    }

    /// Rows removed because they depend on the root.
    pub fn cascaded(&self) -> Vec<(String, EntityId)> {
        let n = self.rows.len().saturating_sub(1);
        self.rows[..n]
            .iter()
            .map(|key| (key.entity.clone(), key.id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Plans deletes against one schema.
pub struct CascadeExecutor<'a> {
    schema: &'a SchemaBundle,
    max_depth: usize,
}

impl<'a> CascadeExecutor<'a> {
    /// Create a new cascade executor.
    pub fn new(schema: &'a SchemaBundle) -> Self {
        Self {
            schema,
            max_depth: MAX_CASCADE_DEPTH,
        }
    }

    /// Override the depth bound.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Plan the delete of `entity` `id`.
    ///
    /// The caller is responsible for checking that the root row exists.
    pub fn plan_delete(
        &self,
        reader: &impl StoreRead,
        entity: &str,
        id: EntityId,
    ) -> Result<DeletePlan, Error> {
        let mut rows = Vec::new();
        let mut visited = HashSet::new();
        self.collect(reader, entity, id, 0, &mut visited, &mut rows)?;

        let validator = ConstraintValidator::new(self.schema);
        for key in &rows {
            validator.validate_delete(reader, &key.entity, key.id, &visited)?;
        }

        debug!(entity, id, rows = rows.len(), "planned delete");
        Ok(DeletePlan { rows })
    }

    fn collect(
        &self,
        reader: &impl StoreRead,
        entity: &str,
        id: EntityId,
        depth: usize,
        visited: &mut HashSet<RowKey>,
        rows: &mut Vec<RowKey>,
    ) -> Result<(), Error> {
        if depth > self.max_depth {
            return Err(lms_core::Error::from(CascadeError::MaxDepthExceeded {
                entity: entity.to_string(),
                id,
                max_depth: self.max_depth,
            })
            .into());
        }

        let key = RowKey::new(entity, id);
        if !visited.insert(key.clone()) {
            return Ok(());
        }

        for relation in self.schema.relations_to(entity) {
            if !relation.is_cascade() {
                continue;
            }
            for child in ReferenceIndex::dependents(reader, &relation.name, id)? {
                self.collect(reader, &relation.from_entity, child, depth + 1, visited, rows)?;
            }
        }

        rows.push(key);
        Ok(())
    }
}
