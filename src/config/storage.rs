//! Storage and snapshot configuration types.

use serde::Deserialize;

use crate::serializer::PayloadType;

/// Default pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
/// Default number of connection attempts at startup.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;
/// Default snapshot cache capacity.
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 5000;

/// Event storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// sqlx connection URL (`postgres://...` or `sqlite://...`).
    pub url: String,
    /// Schema holding the event table. Defaults to the connection's
    /// current schema.
    pub schema: Option<String>,
    /// Stored payload representation, fixed for the lifetime of a store.
    pub payload_type: PayloadType,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Connection attempts before giving up at startup.
    pub connect_attempts: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://evstore.db?mode=rwc".to_string(),
            schema: None,
            payload_type: PayloadType::Text,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
        }
    }
}

impl StorageConfig {
    /// Connection URL with any password masked, for logging.
    pub fn redacted_url(&self) -> String {
        let Some((scheme, rest)) = self.url.split_once("://") else {
            return self.url.clone();
        };
        let Some((credentials, host)) = rest.split_once('@') else {
            return self.url.clone();
        };
        match credentials.split_once(':') {
            Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
            None => self.url.clone(),
        }
    }
}

/// Snapshot backend discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotType {
    #[default]
    None,
    Memory,
    Redis,
}

/// Snapshot accelerator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    #[serde(rename = "type")]
    pub snapshot_type: SnapshotType,
    /// Maximum cached aggregates (memory backend).
    pub capacity: usize,
    /// Redis connection URL (redis backend).
    pub redis_url: String,
    /// Prefix for all snapshot keys (redis backend).
    pub key_prefix: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            snapshot_type: SnapshotType::None,
            capacity: DEFAULT_SNAPSHOT_CAPACITY,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "evstore".to_string(),
        }
    }
}
