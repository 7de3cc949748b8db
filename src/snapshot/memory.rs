//! In-process LRU snapshot cache.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;
use uuid::Uuid;

use super::SnapshotProvider;
use crate::aggregate::Aggregate;
use crate::config::DEFAULT_SNAPSHOT_CAPACITY;

struct Entry {
    last_used: u64,
    state: Box<dyn Any + Send + Sync>,
}

/// Least-recently-used map. `order` indexes entries by last use.
struct Lru {
    capacity: usize,
    clock: u64,
    entries: HashMap<Uuid, Entry>,
    order: BTreeMap<u64, Uuid>,
}

impl Lru {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clock: 0,
            entries: HashMap::new(),
            order: BTreeMap::new(),
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn get(&mut self, key: Uuid) -> Option<&(dyn Any + Send + Sync)> {
        let now = self.tick();
        let entry = self.entries.get_mut(&key)?;
        self.order.remove(&entry.last_used);
        entry.last_used = now;
        self.order.insert(now, key);
        Some(entry.state.as_ref())
    }

    fn put(&mut self, key: Uuid, state: Box<dyn Any + Send + Sync>) {
        if self.capacity == 0 {
            return;
        }
        let now = self.tick();
        if let Some(previous) = self.entries.insert(key, Entry { last_used: now, state }) {
            self.order.remove(&previous.last_used);
        }
        self.order.insert(now, key);

        while self.entries.len() > self.capacity {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
            trace!(stream = %oldest, "Evicted snapshot");
        }
    }

    fn remove(&mut self, key: Uuid) {
        if let Some(entry) = self.entries.remove(&key) {
            self.order.remove(&entry.last_used);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Bounded in-process snapshot cache with LRU eviction.
///
/// States are kept as typed values; reading a stream back as a different
/// aggregate type is a miss.
pub struct InMemorySnapshotProvider {
    cache: Mutex<Lru>,
}

impl InMemorySnapshotProvider {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SNAPSHOT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(Lru::new(capacity)),
        }
    }

    /// Number of cached states.
    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemorySnapshotProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotProvider for InMemorySnapshotProvider {
    async fn initial_state_of<A: Aggregate>(&self, stream_id: Uuid) -> A {
        let mut cache = self.cache.lock().await;
        cache
            .get(stream_id)
            .and_then(|state| state.downcast_ref::<A>())
            .cloned()
            .unwrap_or_default()
    }

    async fn snapshot<A: Aggregate>(&self, aggregate: &A) {
        let Some(stream_id) = aggregate.stream_id() else {
            return;
        };
        self.cache
            .lock()
            .await
            .put(stream_id, Box::new(aggregate.clone()));
    }

    async fn reset(&self, stream_id: Uuid) {
        self.cache.lock().await.remove(stream_id);
    }
}
