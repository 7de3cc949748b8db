//! Binary serializer.
//!
//! The envelope is a protobuf message; the event data inside it is
//! MessagePack with named fields, so payload structs can evolve by adding
//! optional fields.

use std::sync::Arc;

use prost::Message;
use uuid::Uuid;

use super::{EventSerializer, Payload, PayloadType, SerializationError, TypeRegistry};
use crate::event::Event;

#[derive(Clone, PartialEq, Message)]
struct BinaryEnvelope {
    #[prost(string, tag = "1")]
    type_tag: String,
    #[prost(string, optional, tag = "2")]
    stream: Option<String>,
    #[prost(int64, tag = "3")]
    expected_stream_version: i64,
    #[prost(bytes = "vec", tag = "4")]
    data: Vec<u8>,
}

/// Serializer producing [`Payload::Binary`].
pub struct BinarySerializer {
    registry: Arc<TypeRegistry>,
}

impl BinarySerializer {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }
}

impl EventSerializer for BinarySerializer {
    fn payload_type(&self) -> PayloadType {
        PayloadType::Binary
    }

    fn serialize(&self, event: &Event) -> Result<Payload, SerializationError> {
        let envelope = BinaryEnvelope {
            type_tag: self.registry.discriminator(event.payload()),
            stream: event.stream_id().map(|id| id.to_string()),
            expected_stream_version: event.expected_stream_version(),
            data: event
                .payload()
                .to_msgpack()
                .map_err(SerializationError::malformed)?,
        };
        Ok(Payload::Binary(envelope.encode_to_vec()))
    }

    fn deserialize(&self, payload: Payload) -> Result<Event, SerializationError> {
        let bytes = match payload {
            Payload::Binary(bytes) => bytes,
            Payload::Text(_) => {
                return Err(SerializationError::malformed_msg(
                    "expected a binary payload, found text",
                ))
            }
        };

        let envelope =
            BinaryEnvelope::decode(bytes.as_slice()).map_err(SerializationError::malformed)?;
        let stream = envelope
            .stream
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(SerializationError::malformed)?;
        let event_type = self.registry.resolve(&envelope.type_tag)?;
        let payload = event_type
            .decode_msgpack(&envelope.data)
            .map_err(SerializationError::malformed)?;

        Ok(Event::from_parts(
            stream,
            envelope.expected_stream_version,
            payload,
        ))
    }
}
