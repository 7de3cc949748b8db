//! Event model.
//!
//! An [`Event`] carries a polymorphic payload plus the two pieces of metadata
//! the store acts on: the optional stream identity and the stream version the
//! writer expects to find.

use std::any::Any;
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::serializer::EventType;

/// Expected stream version meaning "write without a concurrency check".
pub const NO_VERSION_CHECK: i64 = -1;

/// Marker for concrete domain event types.
///
/// Implemented automatically for every type that is serde-serializable,
/// cloneable and comparable.
pub trait DomainEvent:
    Serialize + DeserializeOwned + Debug + Clone + PartialEq + Send + Sync + 'static
{
}

impl<T> DomainEvent for T where
    T: Serialize + DeserializeOwned + Debug + Clone + PartialEq + Send + Sync + 'static
{
}

/// Object-safe view of a domain event payload.
///
/// The store never knows the concrete payload type; everything it needs
/// (encoding, type metadata, equality, cloning) goes through this trait.
pub trait EventPayload: Any + Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Type descriptor used to resolve the payload back from storage.
    fn event_type(&self) -> EventType;

    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error>;

    fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error>;

    fn clone_payload(&self) -> Box<dyn EventPayload>;

    fn eq_payload(&self, other: &dyn EventPayload) -> bool;
}

impl<T: DomainEvent> EventPayload for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn event_type(&self) -> EventType {
        EventType::of::<T>()
    }

    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    fn clone_payload(&self) -> Box<dyn EventPayload> {
        Box::new(self.clone())
    }

    fn eq_payload(&self, other: &dyn EventPayload) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

impl Clone for Box<dyn EventPayload> {
    fn clone(&self) -> Self {
        self.as_ref().clone_payload()
    }
}

/// The unit of record.
#[derive(Debug, Clone)]
pub struct Event {
    stream_id: Option<Uuid>,
    expected_stream_version: i64,
    payload: Box<dyn EventPayload>,
}

impl Event {
    /// Create an event outside of any stream.
    pub fn new<T: DomainEvent>(payload: T) -> Self {
        Self::from_payload(Box::new(payload))
    }

    pub fn from_payload(payload: Box<dyn EventPayload>) -> Self {
        Self {
            stream_id: None,
            expected_stream_version: NO_VERSION_CHECK,
            payload,
        }
    }

    /// Attach the event to a stream.
    pub fn with_stream(mut self, stream_id: Uuid) -> Self {
        self.stream_id = Some(stream_id);
        self
    }

    /// Request an optimistic concurrency check on write.
    ///
    /// `version` is the number of events the caller believes the stream
    /// currently holds. [`NO_VERSION_CHECK`] disables the check.
    pub fn with_expected_version(mut self, version: i64) -> Self {
        self.expected_stream_version = version;
        self
    }

    pub fn stream_id(&self) -> Option<Uuid> {
        self.stream_id
    }

    pub fn expected_stream_version(&self) -> i64 {
        self.expected_stream_version
    }

    /// True when a write of this event must verify the stream version.
    pub fn requires_version_check(&self) -> bool {
        self.stream_id.is_some() && self.expected_stream_version != NO_VERSION_CHECK
    }

    pub fn payload(&self) -> &dyn EventPayload {
        self.payload.as_ref()
    }

    /// Downcast the payload to a concrete event type.
    pub fn payload_as<T: 'static>(&self) -> Option<&T> {
        self.payload.as_ref().as_any().downcast_ref::<T>()
    }

    pub(crate) fn from_parts(
        stream_id: Option<Uuid>,
        expected_stream_version: i64,
        payload: Box<dyn EventPayload>,
    ) -> Self {
        Self {
            stream_id,
            expected_stream_version,
            payload,
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.stream_id == other.stream_id
            && self.expected_stream_version == other.expected_stream_version
            && self.payload.as_ref().eq_payload(other.payload.as_ref())
    }
}

/// An event as read back from the store, with its global offset.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// Store-assigned global offset.
    pub offset: i64,
    pub event: Event,
}
