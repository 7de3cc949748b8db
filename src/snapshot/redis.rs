//! Redis snapshot cache.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::SnapshotProvider;
use crate::aggregate::Aggregate;
use crate::storage::{Result, StoreError};

/// Redis snapshot cache.
///
/// Stores each aggregate state as JSON under `<prefix>:<stream>:snapshot`.
/// Eviction is left to the server's `maxmemory-policy`.
pub struct RedisSnapshotProvider {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisSnapshotProvider {
    /// Connect to Redis.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., redis://localhost:6379)
    /// * `key_prefix` - Prefix for all keys
    pub async fn new(url: &str, key_prefix: &str) -> Result<Self> {
        let client = Client::open(url).map_err(|e| StoreError::Snapshot(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Snapshot(e.to_string()))?;

        info!(url = %url, "Connected to Redis for snapshots");

        Ok(Self {
            conn,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn snapshot_key(&self, stream_id: Uuid) -> String {
        format!("{}:{}:snapshot", self.key_prefix, stream_id)
    }
}

#[async_trait]
impl SnapshotProvider for RedisSnapshotProvider {
    async fn initial_state_of<A: Aggregate>(&self, stream_id: Uuid) -> A {
        let key = self.snapshot_key(stream_id);
        let mut conn = self.conn.clone();

        let cached = match conn.get::<_, Option<String>>(&key).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(stream = %stream_id, error = %e, "Snapshot read failed; replaying");
                return A::default();
            }
        };

        match cached.map(|json| serde_json::from_str::<A>(&json)) {
            Some(Ok(state)) => {
                debug!(stream = %stream_id, "Retrieved snapshot from Redis");
                state
            }
            Some(Err(e)) => {
                warn!(stream = %stream_id, error = %e, "Unreadable snapshot; replaying");
                A::default()
            }
            None => A::default(),
        }
    }

    async fn snapshot<A: Aggregate>(&self, aggregate: &A) {
        let Some(stream_id) = aggregate.stream_id() else {
            return;
        };
        let json = match serde_json::to_string(aggregate) {
            Ok(json) => json,
            Err(e) => {
                warn!(stream = %stream_id, error = %e, "Snapshot not serializable");
                return;
            }
        };

        let key = self.snapshot_key(stream_id);
        let mut conn = self.conn.clone();
        let stored: redis::RedisResult<()> = conn.set(&key, json).await;
        match stored {
            Ok(()) => debug!(stream = %stream_id, "Stored snapshot in Redis"),
            Err(e) => warn!(stream = %stream_id, error = %e, "Snapshot write failed"),
        }
    }

    async fn reset(&self, stream_id: Uuid) {
        let key = self.snapshot_key(stream_id);
        let mut conn = self.conn.clone();
        let deleted: redis::RedisResult<()> = conn.del(&key).await;
        if let Err(e) = deleted {
            warn!(stream = %stream_id, error = %e, "Snapshot reset failed");
        }
    }
}
