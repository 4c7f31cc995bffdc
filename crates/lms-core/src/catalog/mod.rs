//! Semantic catalog for the LMS store.
//!
//! The catalog stores metadata about entities, relations, constraints,
//! secondary indexes and schema versions.

mod catalog;
mod constraint;
mod entity;
mod field;
mod index;
mod relation;
mod schema;
mod types;

pub use catalog::Catalog;
pub use constraint::{CheckRule, ConstraintDef};
pub use entity::{EntityDef, OrderBy, OrderDirection};
pub use field::FieldDef;
pub use index::IndexDef;
pub use relation::{DeleteBehavior, RelationDef, TargetRule};
pub use schema::SchemaBundle;
pub use types::{FieldType, ScalarType};
