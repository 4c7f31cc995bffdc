//! LMS Proto - value, row and mutation types shared across the LMS store.

pub mod error;
pub mod mutation;
pub mod result;
pub mod value;

pub use error::Error;
pub use mutation::{FieldValue, Mutation, MutationBatch};
pub use result::{EntityRow, MutationResult};
pub use value::Value;

/// Identity of a stored row.
pub type EntityId = i64;
