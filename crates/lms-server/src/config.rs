//! Server configuration.

use clap::{Parser, Subcommand};
use lms_core::StorageConfig;
use std::path::PathBuf;

/// Default data directory.
pub const DEFAULT_DATA_PATH: &str = "./data";

/// Default sled page cache (256 MB).
pub const DEFAULT_CACHE_MB: u64 = 256;

/// Default background flush interval in milliseconds.
pub const DEFAULT_FLUSH_EVERY_MS: u64 = 500;

/// Default administrator e-mail.
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@lms.local";

/// Environment variable holding the administrator password.
pub const ADMIN_PASSWORD_ENV: &str = "LMS_ADMIN_PASSWORD";

/// Identity of the administrator created on an empty store.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedConfig {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Plain-text password; hashed before it is stored. Required only when
    /// the store is empty.
    pub password: Option<String>,
}

impl SeedConfig {
    /// Seed identity with the given password.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    /// Set the administrator's name.
    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = first.into();
        self.last_name = last.into();
        self
    }
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            email: DEFAULT_ADMIN_EMAIL.to_string(),
            first_name: "System".to_string(),
            last_name: "Administrator".to_string(),
            password: None,
        }
    }
}

/// LMS server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the database storage directory.
    pub data_path: PathBuf,

    /// Sled page cache size in bytes.
    pub cache_capacity: u64,

    /// Background flush interval. None flushes only on explicit request.
    pub flush_every_ms: Option<u64>,

    /// Use a throwaway database that is removed on drop.
    pub temporary: bool,

    /// Administrator seed identity.
    pub seed: SeedConfig,
}

impl ServerConfig {
    /// Create a new configuration with the given data path.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            cache_capacity: DEFAULT_CACHE_MB * 1024 * 1024,
            flush_every_ms: Some(DEFAULT_FLUSH_EVERY_MS),
            temporary: false,
            seed: SeedConfig::default(),
        }
    }

    /// Configuration for a temporary database.
    pub fn temporary() -> Self {
        Self {
            temporary: true,
            ..Self::new(DEFAULT_DATA_PATH)
        }
    }

    /// Set the cache capacity in bytes.
    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Set the flush interval.
    pub fn with_flush_every_ms(mut self, ms: Option<u64>) -> Self {
        self.flush_every_ms = ms;
        self
    }

    /// Set the administrator seed identity.
    pub fn with_seed(mut self, seed: SeedConfig) -> Self {
        self.seed = seed;
        self
    }

    /// Storage engine configuration derived from this one.
    pub fn storage_config(&self) -> StorageConfig {
        let config = if self.temporary {
            StorageConfig::temporary()
        } else {
            StorageConfig::new(&self.data_path)
        };
        config
            .with_cache_capacity(self.cache_capacity)
            .with_flush_every_ms(self.flush_every_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_PATH)
    }
}

/// Command-line arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "lms-server")]
#[command(version, about = "LMS store administration", long_about = None)]
pub struct Args {
    /// Path to the database storage directory.
    #[arg(short, long, default_value = DEFAULT_DATA_PATH)]
    pub data_path: PathBuf,

    /// Page cache size in megabytes.
    #[arg(long, default_value_t = DEFAULT_CACHE_MB)]
    pub cache_mb: u64,

    /// Flush interval in milliseconds. Set to 0 to disable background flushing.
    #[arg(long, default_value_t = DEFAULT_FLUSH_EVERY_MS)]
    pub flush_every_ms: u64,

    /// Administrator e-mail used when seeding an empty store.
    #[arg(long, default_value = DEFAULT_ADMIN_EMAIL)]
    pub admin_email: String,

    /// Administrator first name.
    #[arg(long, default_value = "System")]
    pub admin_first_name: String,

    /// Administrator last name.
    #[arg(long, default_value = "Administrator")]
    pub admin_last_name: String,

    /// Administrator password used when seeding an empty store.
    #[arg(long, env = ADMIN_PASSWORD_ENV, hide_env_values = true)]
    pub admin_password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Administrative commands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Install the schema and seed the administrator.
    Init,
    /// Print row counts per entity.
    Stats,
    /// Print one row as JSON.
    Get {
        /// Entity name, e.g. Course.
        entity: String,
        /// Row id.
        id: i64,
    },
    /// Delete one row and everything that cascades from it.
    Delete {
        /// Entity name, e.g. Course.
        entity: String,
        /// Row id.
        id: i64,
    },
}

impl Args {
    /// Split arguments into server configuration and the requested command.
    pub fn into_config(self) -> (ServerConfig, Command) {
        let flush_every_ms = if self.flush_every_ms == 0 {
            None
        } else {
            Some(self.flush_every_ms)
        };

        let seed = SeedConfig {
            email: self.admin_email,
            first_name: self.admin_first_name,
            last_name: self.admin_last_name,
            password: self.admin_password,
        };

        let config = ServerConfig::new(self.data_path)
            .with_cache_capacity(self.cache_mb * 1024 * 1024)
            .with_flush_every_ms(flush_every_ms)
            .with_seed(seed);

        (config, self.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::new("/tmp/lms")
            .with_flush_every_ms(None)
            .with_seed(SeedConfig::new("root@x.com", "pw").with_name("Root", "User"));

        assert_eq!(config.data_path, PathBuf::from("/tmp/lms"));
        assert_eq!(config.flush_every_ms, None);
        assert_eq!(config.seed.email, "root@x.com");
        assert_eq!(config.seed.first_name, "Root");
        assert_eq!(config.seed.password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.data_path, PathBuf::from(DEFAULT_DATA_PATH));
        assert_eq!(config.cache_capacity, 256 * 1024 * 1024);
        assert_eq!(config.seed.email, DEFAULT_ADMIN_EMAIL);
        assert!(config.seed.password.is_none());
    }

    #[test]
    fn test_args_parsing() {
        let args = Args::try_parse_from([
            "lms-server",
            "--data-path",
            "/var/lms",
            "--flush-every-ms",
            "0",
            "--admin-password",
            "s3cret",
            "get",
            "Course",
            "7",
        ])
        .unwrap();

        let (config, command) = args.into_config();
        assert_eq!(config.data_path, PathBuf::from("/var/lms"));
        assert_eq!(config.flush_every_ms, None);
        assert_eq!(config.seed.password.as_deref(), Some("s3cret"));
        assert_eq!(
            command,
            Command::Get {
                entity: "Course".into(),
                id: 7
            }
        );
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Args::try_parse_from(["lms-server"]).is_err());
    }
}
