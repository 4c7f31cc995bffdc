//! Storage layer for the LMS store.
//!
//! A sled database with three trees: `data` holds rows keyed by
//! [`RowKey`], `index` holds secondary index entries and `meta` holds
//! per-entity id sequences.

mod config;
mod engine;
mod reader;
mod record;
mod transaction;

pub mod key;

pub use config::StorageConfig;
pub use engine::StorageEngine;
pub use key::RowKey;
pub use reader::StoreRead;
pub use record::Record;
pub use transaction::{Transaction, TransactionOp};
