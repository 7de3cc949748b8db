//! Aggregate replay.
//!
//! [`AggregateStore`] rebuilds aggregate state from a stream, starting from
//! a cached snapshot when one exists and replaying only the events recorded
//! after it.

use std::sync::Arc;

use futures::TryStreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::event::{Event, RecordedEvent};
use crate::snapshot::{NoopSnapshotProvider, SnapshotProvider};
use crate::storage::{Result, StoreProvider};

/// State folded from the events of one stream.
///
/// `Default` is the state before the first event.
pub trait Aggregate: Default + Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stream this state belongs to; `None` before the first event.
    fn stream_id(&self) -> Option<Uuid>;

    /// Number of events applied so far.
    fn stream_version(&self) -> i64;

    fn apply(&mut self, event: &RecordedEvent);
}

/// Reads aggregates through a snapshot cache.
pub struct AggregateStore<S = NoopSnapshotProvider> {
    provider: Arc<dyn StoreProvider>,
    snapshots: S,
}

impl AggregateStore<NoopSnapshotProvider> {
    /// Store that always replays from the first event.
    pub fn without_snapshots(provider: Arc<dyn StoreProvider>) -> Self {
        Self::new(provider, NoopSnapshotProvider)
    }
}

impl<S: SnapshotProvider> AggregateStore<S> {
    pub fn new(provider: Arc<dyn StoreProvider>, snapshots: S) -> Self {
        Self {
            provider,
            snapshots,
        }
    }

    pub fn snapshots(&self) -> &S {
        &self.snapshots
    }

    /// Current state of the aggregate in `stream_id`.
    pub async fn read_by<A: Aggregate>(&self, stream_id: Uuid) -> Result<A> {
        let mut aggregate: A = self.snapshots.initial_state_of(stream_id).await;
        let from = aggregate.stream_version();

        let mut events = self.provider.read_by_skip(stream_id, from).await?;
        let mut applied = 0usize;
        while let Some(event) = events.try_next().await? {
            aggregate.apply(&event);
            applied += 1;
        }

        debug!(stream = %stream_id, from, applied, "Aggregate replayed");

        if applied > 0 {
            self.snapshots.snapshot(&aggregate).await;
        }
        Ok(aggregate)
    }

    pub async fn write(&self, event: &Event) -> Result<()> {
        self.provider.write(event).await
    }

    /// Delete the stream and drop its snapshot.
    pub async fn delete_by(&self, stream_id: Uuid) -> Result<u64> {
        let deleted = self.provider.delete_by(stream_id).await?;
        self.snapshots.reset(stream_id).await;
        Ok(deleted)
    }

    /// Drop the cached snapshot of a stream.
    pub async fn reset(&self, stream_id: Uuid) {
        self.snapshots.reset(stream_id).await;
    }
}
