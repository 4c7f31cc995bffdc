//! Mutation IR types for write operations.

use crate::value::Value;
use crate::EntityId;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// A mutation operation (insert, update, or delete).
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub enum Mutation {
    /// Insert a new entity.
    Insert {
        /// Entity type to insert into.
        entity: String,
        /// Explicit identity. `None` allocates the next id from the entity's sequence.
        id: Option<EntityId>,
        /// Field values for the new entity.
        data: Vec<FieldValue>,
    },
    /// Update an existing entity.
    Update {
        /// Entity type to update.
        entity: String,
        /// ID of the entity to update.
        id: EntityId,
        /// Field values to update.
        data: Vec<FieldValue>,
    },
    /// Delete an entity (and its cascade dependents).
    Delete {
        /// Entity type to delete from.
        entity: String,
        /// ID of the entity to delete.
        id: EntityId,
    },
}

/// A field name and value pair.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct FieldValue {
    /// Field name.
    pub field: String,
    /// Field value.
    pub value: Value,
}

impl FieldValue {
    /// Create a new field-value pair.
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl Mutation {
    /// Create an insert mutation with a sequence-allocated id.
    pub fn insert(entity: impl Into<String>, data: Vec<FieldValue>) -> Self {
        Mutation::Insert {
            entity: entity.into(),
            id: None,
            data,
        }
    }

    /// Create an insert mutation with an explicit id.
    pub fn insert_with_id(entity: impl Into<String>, id: EntityId, data: Vec<FieldValue>) -> Self {
        Mutation::Insert {
            entity: entity.into(),
            id: Some(id),
            data,
        }
    }

    /// Create an update mutation.
    pub fn update(entity: impl Into<String>, id: EntityId, data: Vec<FieldValue>) -> Self {
        Mutation::Update {
            entity: entity.into(),
            id,
            data,
        }
    }

    /// Create a delete mutation.
    pub fn delete(entity: impl Into<String>, id: EntityId) -> Self {
        Mutation::Delete {
            entity: entity.into(),
            id,
        }
    }

    /// Get the entity type this mutation operates on.
    pub fn entity(&self) -> &str {
        match self {
            Mutation::Insert { entity, .. } => entity,
            Mutation::Update { entity, .. } => entity,
            Mutation::Delete { entity, .. } => entity,
        }
    }
}

/// A batch of mutations to execute atomically.
#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct MutationBatch {
    /// Mutations to execute in order.
    pub mutations: Vec<Mutation>,
}

impl MutationBatch {
    /// Create a new empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a batch from mutations.
    pub fn from_mutations(mutations: Vec<Mutation>) -> Self {
        Self { mutations }
    }

    /// Add a mutation to the batch.
    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Get the number of mutations in the batch.
    pub fn len(&self) -> usize {
        self.mutations.len()
    }
}

impl FromIterator<Mutation> for MutationBatch {
    fn from_iter<T: IntoIterator<Item = Mutation>>(iter: T) -> Self {
        Self {
            mutations: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_builders() {
        let insert = Mutation::insert("User", vec![FieldValue::new("email", "a@x.com")]);
        assert_eq!(insert.entity(), "User");
        assert!(matches!(insert, Mutation::Insert { id: None, .. }));

        let seeded = Mutation::insert_with_id("User", 1, vec![]);
        assert!(matches!(seeded, Mutation::Insert { id: Some(1), .. }));

        let delete = Mutation::delete("Course", 7);
        assert_eq!(delete.entity(), "Course");
    }

    #[test]
    fn test_batch_collect() {
        let batch: MutationBatch = vec![
            Mutation::insert("Course", vec![]),
            Mutation::delete("Lesson", 3),
        ]
        .into_iter()
        .collect();

        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert!(MutationBatch::new().is_empty());
    }
}
