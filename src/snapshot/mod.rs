//! Snapshot accelerators.
//!
//! A snapshot provider caches folded aggregate state so replay can start
//! from the cached version instead of the first event. The cache is never
//! authoritative: any failure is logged and treated as a miss.

mod memory;
#[cfg(feature = "redis")]
mod redis;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

pub use memory::InMemorySnapshotProvider;
#[cfg(feature = "redis")]
pub use self::redis::RedisSnapshotProvider;

use crate::aggregate::Aggregate;
use crate::config::{SnapshotConfig, SnapshotType};
use crate::storage::Result;
#[cfg(not(feature = "redis"))]
use crate::storage::StoreError;

/// Read-through cache of aggregate state keyed by stream.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Cached state for the stream, or the empty state.
    async fn initial_state_of<A: Aggregate>(&self, stream_id: Uuid) -> A {
        let _ = stream_id;
        A::default()
    }

    /// Cache `aggregate` under its own stream id. States without a stream id
    /// are not cached.
    async fn snapshot<A: Aggregate>(&self, aggregate: &A);

    /// Drop the cached state of a stream.
    async fn reset(&self, stream_id: Uuid);
}

/// Provider that never caches.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSnapshotProvider;

#[async_trait]
impl SnapshotProvider for NoopSnapshotProvider {
    async fn snapshot<A: Aggregate>(&self, _aggregate: &A) {}

    async fn reset(&self, _stream_id: Uuid) {}
}

/// Snapshot provider selected by configuration.
pub enum SnapshotBackend {
    Noop(NoopSnapshotProvider),
    Memory(InMemorySnapshotProvider),
    #[cfg(feature = "redis")]
    Redis(RedisSnapshotProvider),
}

impl SnapshotBackend {
    pub async fn from_config(config: &SnapshotConfig) -> Result<Self> {
        info!(snapshot_type = ?config.snapshot_type, "Snapshots");

        match config.snapshot_type {
            SnapshotType::None => Ok(Self::Noop(NoopSnapshotProvider)),
            SnapshotType::Memory => Ok(Self::Memory(InMemorySnapshotProvider::with_capacity(
                config.capacity,
            ))),
            #[cfg(feature = "redis")]
            SnapshotType::Redis => Ok(Self::Redis(
                RedisSnapshotProvider::new(&config.redis_url, &config.key_prefix).await?,
            )),
            #[cfg(not(feature = "redis"))]
            SnapshotType::Redis => {
                tracing::error!("Redis snapshots requested but 'redis' feature is not enabled");
                Err(StoreError::Snapshot(
                    "Redis feature not enabled".to_string(),
                ))
            }
        }
    }
}

#[async_trait]
impl SnapshotProvider for SnapshotBackend {
    async fn initial_state_of<A: Aggregate>(&self, stream_id: Uuid) -> A {
        match self {
            Self::Noop(p) => p.initial_state_of(stream_id).await,
            Self::Memory(p) => p.initial_state_of(stream_id).await,
            #[cfg(feature = "redis")]
            Self::Redis(p) => p.initial_state_of(stream_id).await,
        }
    }

    async fn snapshot<A: Aggregate>(&self, aggregate: &A) {
        match self {
            Self::Noop(p) => p.snapshot(aggregate).await,
            Self::Memory(p) => p.snapshot(aggregate).await,
            #[cfg(feature = "redis")]
            Self::Redis(p) => p.snapshot(aggregate).await,
        }
    }

    async fn reset(&self, stream_id: Uuid) {
        match self {
            Self::Noop(p) => p.reset(stream_id).await,
            Self::Memory(p) => p.reset(stream_id).await,
            #[cfg(feature = "redis")]
            Self::Redis(p) => p.reset(stream_id).await,
        }
    }
}
