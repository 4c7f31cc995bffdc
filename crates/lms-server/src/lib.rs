//! LMS Server library.
//!
//! The learning-management domain on top of `lms-core`: typed entities, the
//! relationship and constraint registry, administrator seeding, cascade
//! planning and the persistence gateway the outer layers consume.

pub mod cascade;
pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod model;
pub mod mutation;
pub mod password;
pub mod registry;
pub mod seed;

pub use cascade::{CascadeExecutor, DeletePlan, MAX_CASCADE_DEPTH};
pub use config::{Args, Command, SeedConfig, ServerConfig};
pub use database::{Database, SharedDatabase};
pub use error::Error;
pub use gateway::{AsyncGateway, Gateway, PersistenceGateway};
pub use mutation::{MutationExecutor, WriteContext};
pub use password::{hash_password, verify_password};
pub use registry::lms_schema;
pub use seed::{ensure_seeded, SeedOutcome, ADMIN_ID};
