//! JSON (text) serializer.
//!
//! Envelope:
//! ```json
//! {"@type": "<alias or type name>", "stream": "<uuid>|null",
//!  "expectedStreamVersion": -1, "data": { ... }}
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EventSerializer, Payload, PayloadType, SerializationError, TypeRegistry};
use crate::event::Event;

#[derive(Serialize, Deserialize)]
struct TextEnvelope {
    #[serde(rename = "@type")]
    type_tag: String,
    #[serde(default)]
    stream: Option<Uuid>,
    #[serde(rename = "expectedStreamVersion", default = "no_version_check")]
    expected_stream_version: i64,
    data: serde_json::Value,
}

fn no_version_check() -> i64 {
    crate::event::NO_VERSION_CHECK
}

/// Serializer producing [`Payload::Text`].
pub struct JsonSerializer {
    registry: Arc<TypeRegistry>,
}

impl JsonSerializer {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }
}

impl EventSerializer for JsonSerializer {
    fn payload_type(&self) -> PayloadType {
        PayloadType::Text
    }

    fn serialize(&self, event: &Event) -> Result<Payload, SerializationError> {
        let envelope = TextEnvelope {
            type_tag: self.registry.discriminator(event.payload()),
            stream: event.stream_id(),
            expected_stream_version: event.expected_stream_version(),
            data: event
                .payload()
                .to_json()
                .map_err(SerializationError::malformed)?,
        };

        let text = serde_json::to_string(&envelope).map_err(SerializationError::malformed)?;
        Ok(Payload::Text(text))
    }

    fn deserialize(&self, payload: Payload) -> Result<Event, SerializationError> {
        let text = match payload {
            Payload::Text(text) => text,
            Payload::Binary(_) => {
                return Err(SerializationError::malformed_msg(
                    "expected a text payload, found binary",
                ))
            }
        };

        let envelope: TextEnvelope =
            serde_json::from_str(&text).map_err(SerializationError::malformed)?;
        let event_type = self.registry.resolve(&envelope.type_tag)?;
        let payload = event_type
            .decode_json(envelope.data)
            .map_err(SerializationError::malformed)?;

        Ok(Event::from_parts(
            envelope.stream,
            envelope.expected_stream_version,
            payload,
        ))
    }
}
