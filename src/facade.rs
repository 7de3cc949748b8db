//! Event store facade.
//!
//! The narrow API command handlers and read models need: append an event,
//! replay everything after an offset, replay one stream.
//!
//! # Example
//!
//! ```ignore
//! use evstore::{Event, EventStore, SqlStoreProvider, TypeRegistry};
//! use futures::TryStreamExt;
//!
//! let registry = Arc::new(TypeRegistry::new());
//! registry.add_alias::<OrderPlaced>("order.placed")?;
//!
//! let provider = SqlStoreProvider::new(pool, PayloadType::Text, registry).await?;
//! let store = EventStore::new(Arc::new(provider));
//!
//! store.write(&Event::new(placed).with_stream(order_id).with_expected_version(0)).await?;
//! let history: Vec<_> = store.read_by(order_id).await?.try_collect().await?;
//! ```

use std::sync::Arc;

use uuid::Uuid;

use crate::event::Event;
use crate::storage::{EventStream, Result, StoreProvider};

/// Thin delegate over a [`StoreProvider`].
#[derive(Clone)]
pub struct EventStore {
    provider: Arc<dyn StoreProvider>,
}

impl EventStore {
    pub fn new(provider: Arc<dyn StoreProvider>) -> Self {
        Self { provider }
    }

    /// Events with an offset strictly greater than `offset`, ascending.
    pub async fn read_from(&self, offset: i64) -> Result<EventStream> {
        self.provider.read_from(offset).await
    }

    /// Events of one stream in insertion order.
    pub async fn read_by(&self, stream_id: Uuid) -> Result<EventStream> {
        self.provider.read_by(stream_id).await
    }

    pub async fn write(&self, event: &Event) -> Result<()> {
        self.provider.write(event).await
    }
}
