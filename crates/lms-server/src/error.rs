//! Server error types.

use lms_core::ConstraintError;
use lms_proto::EntityId;
use thiserror::Error;

/// Gateway and server errors.
///
/// Core errors are sorted into the integrity taxonomy on conversion: unique
/// key collisions become [`Error::UniqueConstraint`], broken or blocking
/// references become [`Error::ReferentialIntegrity`], every other rejected
/// write becomes [`Error::Validation`].
#[derive(Debug, Error)]
pub enum Error {
    /// A unique key is already held by another row.
    #[error("unique constraint violated: {0}")]
    UniqueConstraint(ConstraintError),

    /// A write would leave a dangling reference, or a delete is blocked.
    #[error("referential integrity violated: {0}")]
    ReferentialIntegrity(ConstraintError),

    /// No row with this identity.
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: EntityId },

    /// Field, type or check-rule failure.
    #[error("validation failed: {0}")]
    Validation(ConstraintError),

    /// Entity type missing from the registry.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Ordered index missing from the registry.
    #[error("unknown index: {0}")]
    UnknownIndex(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(lms_core::Error),

    /// Protocol error (row decoding).
    #[error("protocol error: {0}")]
    Protocol(#[from] lms_proto::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Password hashing failed.
    #[error("credential error: {0}")]
    Credential(#[from] pbkdf2::password_hash::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: EntityId) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id,
        }
    }

    /// Check for a unique key collision.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Error::UniqueConstraint(_))
    }

    /// Check for a referential integrity failure.
    pub fn is_referential(&self) -> bool {
        matches!(self, Error::ReferentialIntegrity(_))
    }

    /// Check for a missing row.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<ConstraintError> for Error {
    fn from(err: ConstraintError) -> Self {
        match err {
            ConstraintError::UniqueViolation { .. } => Error::UniqueConstraint(err),
            _ if err.is_referential() => Error::ReferentialIntegrity(err),
            _ => Error::Validation(err),
        }
    }
}

impl From<lms_core::Error> for Error {
    fn from(err: lms_core::Error) -> Self {
        match err {
            lms_core::Error::ConstraintViolation(violation) => violation.into(),
            lms_core::Error::UnknownEntity(name) => Error::UnknownEntity(name),
            lms_core::Error::Protocol(inner) => Error::Protocol(inner),
            other => Error::Storage(other),
        }
    }
}
