//! evstore - append-only event store
//!
//! Records immutable domain events in a SQL table, streams them back in
//! offset order (globally or per stream) and enforces optimistic
//! concurrency on writers of the same stream.
//!
//! - [`serializer`]: typed events to text or binary payloads and back
//! - [`storage`]: SQL dialects and the store providers
//! - [`facade`]: the `read_from` / `read_by` / `write` API
//! - [`snapshot`] and [`aggregate`]: snapshot-accelerated aggregate replay

pub mod aggregate;
pub mod config;
pub mod event;
pub mod facade;
pub mod serializer;
pub mod snapshot;
pub mod storage;
pub mod utils;

#[doc(hidden)]
pub use inventory;

pub use aggregate::{Aggregate, AggregateStore};
pub use event::{DomainEvent, Event, RecordedEvent, NO_VERSION_CHECK};
pub use facade::EventStore;
pub use serializer::{PayloadType, SerializationError, TypeRegistry};
pub use snapshot::{InMemorySnapshotProvider, NoopSnapshotProvider, SnapshotBackend, SnapshotProvider};
pub use storage::{
    EventStream, InMemoryStoreProvider, SqlStoreProvider, StoreError, StoreProvider, StoreState,
};
