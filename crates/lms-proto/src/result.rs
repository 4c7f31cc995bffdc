//! Row and mutation result types.

use crate::error::Error;
use crate::value::Value;
use crate::EntityId;
use serde::{Deserialize, Serialize};

/// A single stored entity row with its identity and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRow {
    /// Entity type name.
    pub entity: String,
    /// Row identity.
    pub id: EntityId,
    /// Field values in declaration order.
    pub fields: Vec<(String, Value)>,
    /// Creation timestamp (microseconds since Unix epoch).
    pub created_at: u64,
    /// Last update timestamp (microseconds since Unix epoch).
    pub updated_at: u64,
}

impl EntityRow {
    /// Look up a field value by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    fn require(&self, field: &str) -> Result<&Value, Error> {
        self.get(field)
            .ok_or_else(|| Error::MissingField(field.to_string()))
    }

    fn mismatch(field: &str, expected: &'static str, actual: &Value) -> Error {
        Error::TypeMismatch {
            field: field.to_string(),
            expected,
            actual: actual.type_name(),
        }
    }

    /// Read a required string field.
    pub fn string(&self, field: &str) -> Result<String, Error> {
        let value = self.require(field)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Self::mismatch(field, "string", value))
    }

    /// Read an optional string field (absent or null yields `None`).
    pub fn opt_string(&self, field: &str) -> Result<Option<String>, Error> {
        match self.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(Self::mismatch(field, "string", other)),
        }
    }

    /// Read a required integer field.
    pub fn int(&self, field: &str) -> Result<i64, Error> {
        let value = self.require(field)?;
        value
            .as_i64()
            .ok_or_else(|| Self::mismatch(field, "int64", value))
    }

    /// Read an optional integer field.
    pub fn opt_int(&self, field: &str) -> Result<Option<i64>, Error> {
        match self.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| Self::mismatch(field, "int64", value)),
        }
    }

    /// Read an optional float field.
    pub fn opt_float(&self, field: &str) -> Result<Option<f64>, Error> {
        match self.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| Self::mismatch(field, "float64", value)),
        }
    }

    /// Read a required timestamp field.
    pub fn timestamp(&self, field: &str) -> Result<i64, Error> {
        let value = self.require(field)?;
        value
            .as_timestamp()
            .ok_or_else(|| Self::mismatch(field, "timestamp", value))
    }

    /// Read an optional timestamp field.
    pub fn opt_timestamp(&self, field: &str) -> Result<Option<i64>, Error> {
        match self.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Timestamp(t)) => Ok(Some(*t)),
            Some(other) => Err(Self::mismatch(field, "timestamp", other)),
        }
    }

    /// Read a string array field; absent or null yields an empty list.
    pub fn strings(&self, field: &str) -> Result<Vec<String>, Error> {
        match self.get(field) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::StringArray(arr)) => Ok(arr.clone()),
            Some(other) => Err(Self::mismatch(field, "string[]", other)),
        }
    }
}

/// Result of a mutation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MutationResult {
    /// Number of rows directly affected.
    pub affected: u64,
    /// IDs of inserted rows (for inserts).
    pub inserted_ids: Vec<EntityId>,
    /// Rows removed by cascading deletes, as (entity, id).
    pub cascaded: Vec<(String, EntityId)>,
}

impl MutationResult {
    /// Create a result for a successful insert.
    pub fn inserted(id: EntityId) -> Self {
        Self {
            affected: 1,
            inserted_ids: vec![id],
            cascaded: Vec::new(),
        }
    }

    /// Create a result for a successful update or delete.
    pub fn affected(count: u64) -> Self {
        Self {
            affected: count,
            ..Self::default()
        }
    }

    /// Attach the rows removed by cascade.
    pub fn with_cascaded(mut self, cascaded: Vec<(String, EntityId)>) -> Self {
        self.cascaded = cascaded;
        self
    }

    /// Fold another result into this one (used for batches).
    pub fn merge(&mut self, other: MutationResult) {
        self.affected += other.affected;
        self.inserted_ids.extend(other.inserted_ids);
        self.cascaded.extend(other.cascaded);
    }
}
