//! Constraint enforcement module.
//!
//! Integrity is kept by three kinds of entries in the `index` tree:
//! - unique entries (single and composite keys, one owner row each)
//! - reference entries (one per child row per relation, keyed by parent)
//! - ordered entries (non-unique composite indexes for sorted retrieval)
//!
//! The [`ConstraintValidator`] checks writes against the schema and keeps all
//! three in step with the rows inside the same transaction.

mod keys;
mod ordered_index;
mod reference_index;
mod unique_index;
mod validator;

pub use keys::encode_sort_key;
pub use ordered_index::OrderedIndex;
pub use reference_index::ReferenceIndex;
pub use unique_index::UniqueIndex;
pub use validator::{CheckMode, ConstraintValidator};
