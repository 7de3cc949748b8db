//! Event serialization.
//!
//! Turns typed events into an opaque stored payload and back. Every payload
//! embeds a type discriminator next to the event data so that the concrete
//! event type can be reconstructed without the store knowing it.
//!
//! Two wire representations are supported, fixed per store instance:
//! - [`PayloadType::Text`]: JSON envelope (`JsonSerializer`)
//! - [`PayloadType::Binary`]: protobuf envelope around MessagePack data
//!   (`BinarySerializer`)

mod binary;
mod json;
mod registry;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

pub use binary::BinarySerializer;
pub use json::JsonSerializer;
pub use registry::{EventType, TypeRegistry};

use crate::event::Event;
use crate::storage::StoreError;

/// Serialization failures.
///
/// `UnknownType` ("unknown event type") is deliberately distinct from
/// `Malformed` ("corrupt record").
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Unknown event type: {0}")]
    UnknownType(String),

    #[error("Malformed payload: {0}")]
    Malformed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Alias {alias} is already registered for {owner}")]
    DuplicateAlias { alias: String, owner: String },
}

impl SerializationError {
    pub(crate) fn malformed(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Malformed(Box::new(error))
    }

    pub(crate) fn malformed_msg(message: impl Into<String>) -> Self {
        Self::Malformed(message.into().into())
    }
}

/// Stored representation of an event payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum PayloadType {
    #[default]
    Text,
    Binary,
}

impl PayloadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadType::Text => "text",
            PayloadType::Binary => "binary",
        }
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(PayloadType::Text),
            "binary" => Ok(PayloadType::Binary),
            _ => Err(StoreError::UnsupportedPayloadType(s.to_string())),
        }
    }
}

impl TryFrom<String> for PayloadType {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// An opaque stored payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Payload::Text(_) => PayloadType::Text,
            Payload::Binary(_) => PayloadType::Binary,
        }
    }
}

/// Converts events to and from one stored payload representation.
pub trait EventSerializer: Send + Sync {
    fn payload_type(&self) -> PayloadType;

    fn serialize(&self, event: &Event) -> Result<Payload, SerializationError>;

    fn deserialize(&self, payload: Payload) -> Result<Event, SerializationError>;
}

/// Create the serializer for a payload representation.
pub fn new_event_serializer(
    payload_type: PayloadType,
    registry: Arc<TypeRegistry>,
) -> Arc<dyn EventSerializer> {
    match payload_type {
        PayloadType::Text => Arc::new(JsonSerializer::new(registry)),
        PayloadType::Binary => Arc::new(BinarySerializer::new(registry)),
    }
}
