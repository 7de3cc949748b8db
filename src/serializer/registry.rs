//! Event type registry.
//!
//! Maps concrete event types to short aliases and resolves stored type
//! discriminators back to decoders. Resolution never loads anything at
//! runtime: a discriminator resolves only to types that were
//!
//! - registered with an alias (`TypeRegistry::add_alias`),
//! - registered explicitly (`TypeRegistry::register`),
//! - submitted statically with [`event_type!`](crate::event_type), or
//! - serialized earlier by this process.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::{debug, trace};

use super::SerializationError;
use crate::event::{DomainEvent, EventPayload};

type JsonDecoder = fn(serde_json::Value) -> Result<Box<dyn EventPayload>, serde_json::Error>;
type MsgpackDecoder = fn(&[u8]) -> Result<Box<dyn EventPayload>, rmp_serde::decode::Error>;

/// Decoder table entry for one concrete event type.
#[derive(Clone, Copy)]
pub struct EventType {
    type_name: fn() -> &'static str,
    type_id: fn() -> TypeId,
    from_json: JsonDecoder,
    from_msgpack: MsgpackDecoder,
}

impl EventType {
    pub const fn of<T: DomainEvent>() -> Self {
        Self {
            type_name: std::any::type_name::<T>,
            type_id: TypeId::of::<T>,
            from_json: decode_json::<T>,
            from_msgpack: decode_msgpack::<T>,
        }
    }

    /// Fully qualified type name, the fallback discriminator.
    pub fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    pub fn decode_json(
        &self,
        value: serde_json::Value,
    ) -> Result<Box<dyn EventPayload>, serde_json::Error> {
        (self.from_json)(value)
    }

    pub fn decode_msgpack(
        &self,
        bytes: &[u8],
    ) -> Result<Box<dyn EventPayload>, rmp_serde::decode::Error> {
        (self.from_msgpack)(bytes)
    }
}

impl std::fmt::Debug for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EventType").field(&self.type_name()).finish()
    }
}

fn decode_json<T: DomainEvent>(
    value: serde_json::Value,
) -> Result<Box<dyn EventPayload>, serde_json::Error> {
    let payload: T = serde_json::from_value(value)?;
    Ok(Box::new(payload))
}

fn decode_msgpack<T: DomainEvent>(
    bytes: &[u8],
) -> Result<Box<dyn EventPayload>, rmp_serde::decode::Error> {
    let payload: T = rmp_serde::from_slice(bytes)?;
    Ok(Box::new(payload))
}

inventory::collect!(EventType);

/// Make an event type resolvable by its fully qualified name in every
/// process that links it, without registering an alias.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct OrderPlaced { order_id: String }
///
/// evstore::event_type!(OrderPlaced);
/// ```
#[macro_export]
macro_rules! event_type {
    ($ty:ty) => {
        $crate::inventory::submit! {
            $crate::serializer::EventType::of::<$ty>()
        }
    };
}

#[derive(Default)]
struct Tables {
    /// Serialization side: type -> alias. First registration wins.
    aliases: HashMap<TypeId, String>,
    /// Deserialization side: alias -> decoder.
    by_alias: HashMap<String, EventType>,
    /// Fully qualified name -> decoder, filled on first resolution.
    by_name: HashMap<&'static str, EventType>,
}

/// Bidirectional type <-> alias table shared by the serializers.
///
/// Configure aliases before the first write; discriminators written to
/// storage must stay resolvable across restarts.
#[derive(Default)]
pub struct TypeRegistry {
    tables: RwLock<Tables>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `alias` as the discriminator of `T`.
    ///
    /// Returns the alias previously associated with `T`, in which case the
    /// call is a no-op. Fails when `alias` already belongs to another type.
    pub fn add_alias<T: DomainEvent>(
        &self,
        alias: impl Into<String>,
    ) -> Result<Option<String>, SerializationError> {
        let alias = alias.into();
        let event_type = EventType::of::<T>();
        trace!(alias = %alias, type_name = event_type.type_name(), "Adding event type alias");

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = tables.aliases.get(&event_type.type_id()) {
            return Ok(Some(previous.clone()));
        }

        if let Some(owner) = tables.by_alias.get(&alias) {
            return Err(SerializationError::DuplicateAlias {
                alias,
                owner: owner.type_name().to_string(),
            });
        }

        tables.aliases.insert(event_type.type_id(), alias.clone());
        tables.by_alias.insert(alias, event_type);
        tables.by_name.insert(event_type.type_name(), event_type);
        Ok(None)
    }

    /// Make `T` resolvable by its fully qualified name.
    pub fn register<T: DomainEvent>(&self) {
        let event_type = EventType::of::<T>();
        self.remember(event_type);
    }

    /// The alias registered for `T`, if any.
    pub fn alias_of<T: DomainEvent>(&self) -> Option<String> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.aliases.get(&TypeId::of::<T>()).cloned()
    }

    /// Discriminator to embed for `payload`: its alias, or its fully
    /// qualified name when no alias is registered.
    pub fn discriminator(&self, payload: &dyn EventPayload) -> String {
        let event_type = payload.event_type();
        {
            let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(alias) = tables.aliases.get(&event_type.type_id()) {
                return alias.clone();
            }
            if tables.by_name.contains_key(event_type.type_name()) {
                return event_type.type_name().to_string();
            }
        }
        self.remember(event_type);
        event_type.type_name().to_string()
    }

    /// Resolve a stored discriminator to its decoder.
    pub fn resolve(&self, discriminator: &str) -> Result<EventType, SerializationError> {
        {
            let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(event_type) = tables.by_alias.get(discriminator) {
                return Ok(*event_type);
            }
            if let Some(event_type) = tables.by_name.get(discriminator) {
                return Ok(*event_type);
            }
        }

        let submitted = inventory::iter::<EventType>
            .into_iter()
            .find(|event_type| event_type.type_name() == discriminator)
            .copied();

        match submitted {
            Some(event_type) => {
                debug!(type_name = discriminator, "Resolved event type by name");
                self.remember(event_type);
                Ok(event_type)
            }
            None => Err(SerializationError::UnknownType(discriminator.to_string())),
        }
    }

    fn remember(&self, event_type: EventType) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables
            .by_name
            .entry(event_type.type_name())
            .or_insert(event_type);
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("TypeRegistry")
            .field("aliases", &tables.by_alias.keys().collect::<Vec<_>>())
            .field("known_types", &tables.by_name.len())
            .finish()
    }
}
