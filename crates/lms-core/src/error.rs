//! Core error types.

use lms_proto::EntityId;
use thiserror::Error;

/// Core database errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] lms_proto::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// Record not found.
    #[error("record not found")]
    NotFound,

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Schema definition error.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Entity type not present in the current schema.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// A write violated a schema constraint.
    #[error(transparent)]
    ConstraintViolation(#[from] ConstraintError),

    /// A cascading delete could not be planned.
    #[error(transparent)]
    Cascade(#[from] CascadeError),
}

/// Violations detected while validating a write.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstraintError {
    /// Another row already holds the unique key.
    #[error("unique constraint '{constraint}' violated on {entity}({}) = {value}", fields.join(", "))]
    UniqueViolation {
        constraint: String,
        entity: String,
        fields: Vec<String>,
        value: String,
    },

    /// Delete blocked because dependents still reference the row.
    #[error("cannot delete {entity}: {count} {referencing_entity} row(s) still reference it via '{constraint}'")]
    RestrictViolation {
        constraint: String,
        entity: String,
        referencing_entity: String,
        count: usize,
    },

    /// A foreign key points at a row that does not exist.
    #[error("{entity}.{field} references missing {referenced_entity} {id}")]
    ForeignKeyViolation {
        constraint: String,
        entity: String,
        field: String,
        referenced_entity: String,
        id: EntityId,
    },

    /// The referenced row exists but is not an acceptable parent.
    #[error("{entity}.{field} must reference a {referenced_entity} with {rule_field} in [{}], found '{actual}'", allowed.join(", "))]
    TargetRuleViolation {
        constraint: String,
        entity: String,
        field: String,
        referenced_entity: String,
        rule_field: String,
        allowed: Vec<String>,
        actual: String,
    },

    /// A check rule rejected a field value.
    #[error("check '{constraint}' failed on {entity}.{field}: {message}")]
    CheckViolation {
        constraint: String,
        entity: String,
        field: String,
        message: String,
    },

    /// A required field was absent or null.
    #[error("{entity}.{field} is required")]
    MissingField { entity: String, field: String },

    /// A field is not declared on the entity.
    #[error("{entity} has no field '{field}'")]
    UnknownField { entity: String, field: String },

    /// A field value does not match the declared type.
    #[error("{entity}.{field} expected {expected}, got {actual}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: String,
        actual: String,
    },

    /// An enum field holds a value outside its variants.
    #[error("{entity}.{field} has invalid value '{value}'")]
    InvalidEnumValue {
        entity: String,
        field: String,
        value: String,
    },
}

impl ConstraintError {
    /// Whether this violation concerns references between rows.
    pub fn is_referential(&self) -> bool {
        matches!(
            self,
            ConstraintError::RestrictViolation { .. }
                | ConstraintError::ForeignKeyViolation { .. }
                | ConstraintError::TargetRuleViolation { .. }
        )
    }
}

/// Errors raised while walking cascade relations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CascadeError {
    /// Cascade chain deeper than the configured bound.
    #[error("cascade depth exceeded at {entity} {id} (max {max_depth})")]
    MaxDepthExceeded {
        entity: String,
        id: EntityId,
        max_depth: usize,
    },

    /// A relation listed in the schema points at an unknown entity.
    #[error("relation '{relation}' has no target entity")]
    DanglingRelation { relation: String },
}
