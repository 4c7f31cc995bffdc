//! Core type definitions for the catalog.

use lms_proto::Value;
use rkyv::{Archive, Deserialize, Serialize};

/// Scalar data types supported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer (also used for identities and foreign keys).
    Int64,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
}

/// Field types - flat representation without recursion.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum FieldType {
    /// A scalar value.
    Scalar(ScalarType),
    /// An optional scalar value (nullable).
    OptionalScalar(ScalarType),
    /// An array of scalar values.
    ArrayScalar(ScalarType),
    /// An enumeration stored as its variant name.
    Enum {
        /// Name of the enum type.
        name: String,
        /// Allowed variant values.
        variants: Vec<String>,
    },
    /// An optional enumeration.
    OptionalEnum {
        /// Name of the enum type.
        name: String,
        /// Allowed variant values.
        variants: Vec<String>,
    },
}

impl ScalarType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarType::Int32 | ScalarType::Int64 | ScalarType::Float64
        )
    }

    /// Type name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Float64 => "float64",
            ScalarType::String => "string",
            ScalarType::Timestamp => "timestamp",
        }
    }

    /// Check whether a non-null value fits this scalar type.
    ///
    /// Integers widen into `Int64` and `Float64`.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ScalarType::Bool, Value::Bool(_)) => true,
            (ScalarType::Int32, Value::Int32(_)) => true,
            (ScalarType::Int64, Value::Int32(_) | Value::Int64(_)) => true,
            (ScalarType::Float64, Value::Float64(_) | Value::Int32(_) | Value::Int64(_)) => true,
            (ScalarType::String, Value::String(_)) => true,
            (ScalarType::Timestamp, Value::Timestamp(_)) => true,
            _ => false,
        }
    }
}

impl FieldType {
    /// Create a scalar field type.
    pub fn scalar(scalar: ScalarType) -> Self {
        FieldType::Scalar(scalar)
    }

    /// Create an optional scalar field type.
    pub fn optional_scalar(scalar: ScalarType) -> Self {
        FieldType::OptionalScalar(scalar)
    }

    /// Create an array of scalars field type.
    pub fn array_scalar(scalar: ScalarType) -> Self {
        FieldType::ArrayScalar(scalar)
    }

    /// Create an enum field type.
    pub fn enum_type(name: impl Into<String>, variants: &[&str]) -> Self {
        FieldType::Enum {
            name: name.into(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Create an optional enum field type.
    pub fn optional_enum(name: impl Into<String>, variants: &[&str]) -> Self {
        FieldType::OptionalEnum {
            name: name.into(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Check if this type admits null.
    pub fn is_optional(&self) -> bool {
        matches!(
            self,
            FieldType::OptionalScalar(_) | FieldType::OptionalEnum { .. }
        )
    }

    /// Get the allowed variants if this is an enum type.
    pub fn variants(&self) -> Option<&[String]> {
        match self {
            FieldType::Enum { variants, .. } | FieldType::OptionalEnum { variants, .. } => {
                Some(variants)
            }
            _ => None,
        }
    }

    /// Check whether a non-null value has the right shape for this type.
    ///
    /// Enum variant membership is checked separately so the caller can report
    /// the offending value.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::Scalar(s) | FieldType::OptionalScalar(s) => s.accepts(value),
            FieldType::ArrayScalar(ScalarType::String) => {
                matches!(value, Value::StringArray(_))
            }
            FieldType::ArrayScalar(_) => false,
            FieldType::Enum { .. } | FieldType::OptionalEnum { .. } => {
                matches!(value, Value::String(_))
            }
        }
    }

    /// Human-readable description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            FieldType::Scalar(s) => s.name().to_string(),
            FieldType::OptionalScalar(s) => format!("{}?", s.name()),
            FieldType::ArrayScalar(s) => format!("{}[]", s.name()),
            FieldType::Enum { name, .. } => name.clone(),
            FieldType::OptionalEnum { name, .. } => format!("{}?", name),
        }
    }
}
