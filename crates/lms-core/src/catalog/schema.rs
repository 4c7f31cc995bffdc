//! Schema bundle - versioned snapshot of the entire schema.

use super::{ConstraintDef, EntityDef, IndexDef, RelationDef};
use crate::error::Error;
use rkyv::{Archive, Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A versioned snapshot of the entire schema.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct SchemaBundle {
    /// Schema version (monotonically increasing).
    pub version: u64,
    /// Creation timestamp (microseconds since Unix epoch).
    pub created_at: u64,
    /// Entity definitions keyed by name.
    pub entities: HashMap<String, EntityDef>,
    /// Relation definitions in declaration order.
    pub relations: Vec<RelationDef>,
    /// Constraint definitions.
    pub constraints: Vec<ConstraintDef>,
    /// Secondary index definitions.
    pub indexes: Vec<IndexDef>,
}

impl SchemaBundle {
    /// Create an empty schema bundle.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            created_at: crate::storage::key::current_timestamp(),
            entities: HashMap::new(),
            relations: Vec::new(),
            constraints: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Add an entity to the schema.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Add a relation to the schema.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Add a constraint to the schema.
    pub fn with_constraint(mut self, constraint: ConstraintDef) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Add a secondary index to the schema.
    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Get a relation by name.
    pub fn get_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Get an index by name.
    pub fn get_index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Get all relations for an entity (as source).
    pub fn relations_from(&self, entity: &str) -> Vec<&RelationDef> {
        self.relations
            .iter()
            .filter(|r| r.from_entity == entity)
            .collect()
    }

    /// Get all relations to an entity (as target).
    pub fn relations_to(&self, entity: &str) -> Vec<&RelationDef> {
        self.relations
            .iter()
            .filter(|r| r.to_entity == entity)
            .collect()
    }

    /// Get all constraints for an entity.
    pub fn constraints_for(&self, entity: &str) -> Vec<&ConstraintDef> {
        self.constraints
            .iter()
            .filter(|c| c.entity() == entity)
            .collect()
    }

    /// Get all secondary indexes for an entity.
    pub fn indexes_for(&self, entity: &str) -> Vec<&IndexDef> {
        self.indexes.iter().filter(|i| i.entity == entity).collect()
    }

    /// List all entity names, sorted.
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Compare definitions, ignoring version and creation time.
    pub fn same_definitions(&self, other: &SchemaBundle) -> bool {
        self.entities == other.entities
            && self.relations == other.relations
            && self.constraints == other.constraints
            && self.indexes == other.indexes
    }

    /// Check that every relation, constraint and index names known entities and fields.
    pub fn validate(&self) -> Result<(), Error> {
        for (name, entity) in &self.entities {
            if name != &entity.name {
                return Err(Error::InvalidSchema(format!(
                    "entity registered as '{}' is named '{}'",
                    name, entity.name
                )));
            }
            let mut seen = HashSet::new();
            for field in &entity.fields {
                if field.name == entity.identity_field || !seen.insert(field.name.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "duplicate field {}.{}",
                        entity.name, field.name
                    )));
                }
            }
        }

        let mut names = HashSet::new();
        for relation in &self.relations {
            if !names.insert(relation.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate relation '{}'",
                    relation.name
                )));
            }
            self.require_field(&relation.from_entity, &relation.from_field)?;
            let target = self.require_entity(&relation.to_entity)?;
            if relation.to_field != target.identity_field {
                return Err(Error::InvalidSchema(format!(
                    "relation '{}' must reference the identity of {}",
                    relation.name, relation.to_entity
                )));
            }
            if let Some(rule) = &relation.target_rule {
                self.require_field(&relation.to_entity, &rule.field)?;
            }
        }

        let mut names = HashSet::new();
        for constraint in &self.constraints {
            if !names.insert(constraint.name()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate constraint '{}'",
                    constraint.name()
                )));
            }
            for field in constraint.fields() {
                self.require_field(constraint.entity(), field)?;
            }
        }

        let mut names = HashSet::new();
        for index in &self.indexes {
            if !names.insert(index.name.as_str()) || index.fields.is_empty() {
                return Err(Error::InvalidSchema(format!(
                    "index '{}' is duplicated or empty",
                    index.name
                )));
            }
            for field in &index.fields {
                self.require_field(&index.entity, field)?;
            }
        }

        Ok(())
    }

    fn require_entity(&self, name: &str) -> Result<&EntityDef, Error> {
        self.get_entity(name)
            .ok_or_else(|| Error::InvalidSchema(format!("unknown entity '{}'", name)))
    }

    fn require_field(&self, entity: &str, field: &str) -> Result<(), Error> {
        if self.require_entity(entity)?.has_field(field) {
            Ok(())
        } else {
            Err(Error::InvalidSchema(format!(
                "unknown field '{}.{}'",
                entity, field
            )))
        }
    }

    /// Serialize the schema bundle to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a schema bundle from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

impl Default for SchemaBundle {
    fn default() -> Self {
        Self::new(0)
    }
}
