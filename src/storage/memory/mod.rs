//! In-memory store provider.
//!
//! Keeps the whole log in a `Vec` behind a lock. Offsets start at 1 and are
//! never reused, including after deletes. Failure switches let tests drive
//! the error paths of code built on top of a provider.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{EventStream, Result, StoreError, StoreProvider};
use crate::event::{Event, RecordedEvent};

#[derive(Default)]
struct Log {
    events: Vec<RecordedEvent>,
    last_offset: i64,
}

impl Log {
    fn version_of(&self, stream_id: Uuid) -> i64 {
        self.events
            .iter()
            .filter(|e| e.event.stream_id() == Some(stream_id))
            .count() as i64
    }

    fn stream(&self, stream_id: Uuid) -> impl Iterator<Item = &RecordedEvent> {
        self.events
            .iter()
            .filter(move |e| e.event.stream_id() == Some(stream_id))
    }
}

/// Store provider holding events in process memory.
#[derive(Default)]
pub struct InMemoryStoreProvider {
    log: RwLock<Log>,
    fail_on_write: RwLock<bool>,
    fail_on_read: RwLock<bool>,
}

impl InMemoryStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_write(&self, fail: bool) {
        *self.fail_on_write.write().await = fail;
    }

    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    /// Number of events currently held.
    pub async fn len(&self) -> usize {
        self.log.read().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn check_read(&self) -> Result<()> {
        if *self.fail_on_read.read().await {
            return Err(StoreError::Broken("simulated read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreProvider for InMemoryStoreProvider {
    async fn read_from(&self, offset: i64) -> Result<EventStream> {
        self.check_read().await?;
        let log = self.log.read().await;
        let events = log
            .events
            .iter()
            .filter(|e| e.offset > offset)
            .cloned()
            .collect();
        Ok(EventStream::from_events(events))
    }

    async fn read_by(&self, stream_id: Uuid) -> Result<EventStream> {
        self.read_by_skip(stream_id, 0).await
    }

    async fn read_by_skip(&self, stream_id: Uuid, skip: i64) -> Result<EventStream> {
        self.check_read().await?;
        let log = self.log.read().await;
        let events = log
            .stream(stream_id)
            .skip(skip.max(0) as usize)
            .cloned()
            .collect();
        Ok(EventStream::from_events(events))
    }

    async fn stream_version(&self, stream_id: Uuid) -> Result<i64> {
        self.check_read().await?;
        Ok(self.log.read().await.version_of(stream_id))
    }

    async fn write(&self, event: &Event) -> Result<()> {
        if *self.fail_on_write.read().await {
            return Err(StoreError::Broken("simulated write failure".to_string()));
        }

        let mut log = self.log.write().await;

        if let (true, Some(stream_id)) = (event.requires_version_check(), event.stream_id()) {
            let expected = event.expected_stream_version();
            let actual = log.version_of(stream_id);
            if actual != expected {
                return Err(StoreError::VersionMismatch { expected, actual });
            }
        }

        log.last_offset += 1;
        let offset = log.last_offset;
        log.events.push(RecordedEvent {
            offset,
            event: event.clone(),
        });
        debug!(offset, "Event written");
        Ok(())
    }

    async fn delete_by(&self, stream_id: Uuid) -> Result<u64> {
        let mut log = self.log.write().await;
        let before = log.events.len();
        log.events
            .retain(|e| e.event.stream_id() != Some(stream_id));
        let deleted = (before - log.events.len()) as u64;
        warn!(stream = %stream_id, deleted, "Stream deleted");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests;
