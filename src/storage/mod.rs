//! Storage providers.
//!
//! A [`StoreProvider`] owns the physical event log: it appends serialized
//! events, streams them back in offset order and deletes whole streams.
//!
//! Implementations:
//! - `SqlStoreProvider`: PostgreSQL or SQLite through the sqlx `Any` driver
//! - `InMemoryStoreProvider`: process-local log for tests and embedding

use async_trait::async_trait;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::info;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::event::Event;
use crate::serializer::SerializationError;
use crate::utils::bootstrap::connect_with_retry;

pub mod dialect;
pub mod memory;
pub mod schema;
pub mod sql;
mod state;
mod stream;

pub use dialect::{dialect_for, Dialect, Statements};
pub use memory::InMemoryStoreProvider;
pub use sql::SqlStoreProvider;
pub use state::{Lifecycle, StoreState};
pub use stream::EventStream;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unsupported database: {0}")]
    UnsupportedDialect(String),

    #[error("Unsupported payload type: {0}")]
    UnsupportedPayloadType(String),

    #[error("Invalid schema name: {0}")]
    InvalidSchema(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Stream version mismatch: expected {expected}, actual {actual}")]
    VersionMismatch { expected: i64, actual: i64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store is broken: {0}")]
    Broken(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Snapshot backend error: {0}")]
    Snapshot(String),
}

/// Interface for event persistence.
///
/// Every operation acquires its own connection. Reads hand that connection
/// to the returned [`EventStream`], which keeps it until the stream is
/// consumed, closed or dropped.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    /// Stream every event with an offset strictly greater than `offset`.
    async fn read_from(&self, offset: i64) -> Result<EventStream>;

    /// Stream every event of a stream in insertion order.
    async fn read_by(&self, stream_id: Uuid) -> Result<EventStream>;

    /// Stream the events of a stream, skipping the first `skip`.
    async fn read_by_skip(&self, stream_id: Uuid, skip: i64) -> Result<EventStream>;

    /// Number of events recorded for a stream.
    async fn stream_version(&self, stream_id: Uuid) -> Result<i64>;

    /// Append an event, verifying its expected stream version when set.
    async fn write(&self, event: &Event) -> Result<()>;

    /// Remove a whole stream. Returns the number of deleted events.
    async fn delete_by(&self, stream_id: Uuid) -> Result<u64>;
}

/// Build the connection pool described by `config`.
pub async fn connect(config: &StorageConfig) -> Result<AnyPool> {
    sqlx::any::install_default_drivers();

    let address = config.redacted_url();
    info!(url = %address, max_connections = config.max_connections, "Connecting to event store database");

    let pool = connect_with_retry("event store database", &address, config.connect_attempts, || {
        AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
    })
    .await?;

    Ok(pool)
}
