//! Database wrapper combining StorageEngine, Catalog and the write gate.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::info;

use lms_core::{Catalog, SchemaBundle, StorageEngine};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::registry::lms_schema;

/// Database wrapper that provides access to storage, catalog and schema.
pub struct Database {
    storage: StorageEngine,
    catalog: Catalog,
    /// Registry schema as installed in the catalog.
    schema: SchemaBundle,
    /// Serializes check-then-act write sequences.
    write_gate: Mutex<()>,
}

impl Database {
    /// Open a database and install the LMS schema if the stored one differs.
    pub fn open(config: &ServerConfig) -> Result<Self, Error> {
        if !config.temporary {
            std::fs::create_dir_all(&config.data_path).map_err(|e| {
                Error::Database(format!("failed to create data directory: {}", e))
            })?;
        }

        let storage = StorageEngine::open(config.storage_config())
            .map_err(|e| Error::Database(format!("failed to open storage: {}", e)))?;

        let catalog = Catalog::open(storage.db())
            .map_err(|e| Error::Database(format!("failed to open catalog: {}", e)))?;

        let schema = install_schema(&catalog)?;

        Ok(Self {
            storage,
            catalog,
            schema,
            write_gate: Mutex::new(()),
        })
    }

    /// Open a throwaway database (tests, dry runs).
    pub fn open_temporary() -> Result<Self, Error> {
        Self::open(&ServerConfig::temporary())
    }

    /// Get a reference to the storage engine.
    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    /// Get a reference to the catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Get the installed schema.
    pub fn schema(&self) -> &SchemaBundle {
        &self.schema
    }

    /// Get the current schema version.
    pub fn schema_version(&self) -> u64 {
        self.catalog.current_version()
    }

    /// Take the write gate. Held for the whole of a validated write.
    pub fn write_gate(&self) -> MutexGuard<'_, ()> {
        self.write_gate.lock()
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.storage
            .flush()
            .map_err(|e| Error::Database(format!("failed to flush storage: {}", e)))
    }
}

fn install_schema(catalog: &Catalog) -> Result<SchemaBundle, Error> {
    let wanted = lms_schema();

    if let Some(current) = catalog.current_schema() {
        if current.same_definitions(&wanted) {
            return Ok(current);
        }
    }

    let version = catalog
        .apply_schema(wanted)
        .map_err(|e| Error::Database(format!("failed to install schema: {}", e)))?;
    info!(version, "installed LMS schema");

    catalog
        .current_schema()
        .ok_or_else(|| Error::Database("schema missing after install".to_string()))
}

/// Shared database reference.
pub type SharedDatabase = Arc<Database>;
