//! LMS Core - catalog, storage engine, and integrity indexes.
//!
//! This crate holds everything below the LMS domain: schema metadata, the
//! sled-backed row store and the secondary indexes that enforce uniqueness and
//! referential integrity.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod catalog;
pub mod codec;
pub mod constraint;
pub mod error;
pub mod storage;

pub use catalog::{
    Catalog, CheckRule, ConstraintDef, DeleteBehavior, EntityDef, FieldDef, FieldType, IndexDef,
    RelationDef, ScalarType, SchemaBundle, TargetRule,
};
pub use codec::{decode_entity, encode_entity, get_field};
pub use constraint::{
    encode_sort_key, CheckMode, ConstraintValidator, OrderedIndex, ReferenceIndex, UniqueIndex,
};
pub use error::{CascadeError, ConstraintError, Error};
pub use storage::{Record, RowKey, StorageConfig, StorageEngine, StoreRead, Transaction};

/// Re-export protocol types.
pub use lms_proto as proto;
