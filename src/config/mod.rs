//! Configuration.
//!
//! Loaded from YAML files and environment variables with the `config` crate.

mod storage;

pub use storage::{
    SnapshotConfig, SnapshotType, StorageConfig, DEFAULT_CONNECT_ATTEMPTS,
    DEFAULT_MAX_CONNECTIONS, DEFAULT_SNAPSHOT_CAPACITY,
};

use serde::Deserialize;

use crate::storage::Result;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "evstore.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "EVSTORE_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "EVSTORE";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "EVSTORE_LOG";

/// Event store configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub snapshots: SnapshotConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Sources, later overriding earlier:
    /// 1. `evstore.yaml` in the current directory (if it exists)
    /// 2. File given by `path` (if provided)
    /// 3. File named by `EVSTORE_CONFIG` (if set)
    /// 4. `EVSTORE__<SECTION>__<KEY>` environment variables
    pub fn load(path: Option<&str>) -> Result<Self> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
