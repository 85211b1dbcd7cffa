//! Event type registry.
//!
//! Maps a stored event's type string to the decoder that reconstructs the
//! typed domain event from the envelope and its payload bytes. The registry
//! is built once at startup and read-only afterwards; components that decode
//! hold it by reference rather than going through hidden global state.

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::event::{StoredEvent, TypedEvent};

/// Reconstructs a typed event from a stored row.
pub type EventDecoder = Box<dyn Fn(&StoredEvent) -> Result<Box<dyn TypedEvent>> + Send + Sync>;

/// Accumulates decoder registrations before the registry is frozen.
#[derive(Default)]
pub struct RegistryBuilder {
    decoders: HashMap<String, EventDecoder>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder under an exact event-type string. Each type
    /// registers exactly one decoder; a later registration for the same type
    /// replaces the earlier one.
    pub fn register<F>(mut self, event_type: impl Into<String>, decoder: F) -> Self
    where
        F: Fn(&StoredEvent) -> Result<Box<dyn TypedEvent>> + Send + Sync + 'static,
    {
        self.decoders.insert(event_type.into(), Box::new(decoder));
        self
    }

    pub fn build(self) -> EventTypeRegistry {
        EventTypeRegistry {
            decoders: self.decoders,
        }
    }
}

/// Immutable mapping from event-type string to decoder.
pub struct EventTypeRegistry {
    decoders: HashMap<String, EventDecoder>,
}

impl EventTypeRegistry {
    /// Decode one stored event into its registered typed form.
    ///
    /// An unregistered type string is an `UnknownEventType` failure distinct
    /// from decode failure; silently dropping unknown events would corrupt
    /// read-model projections built from the log.
    pub fn decode(&self, event: &StoredEvent) -> Result<Box<dyn TypedEvent>> {
        match self.decoders.get(&event.event_type) {
            Some(decoder) => decoder(event),
            None => Err(Error::UnknownEventType {
                event_type: event.event_type.clone(),
            }),
        }
    }

    /// Lazily decode a query result in order. The iterator is finite and
    /// non-restartable; each item surfaces its own decode outcome.
    pub fn decode_all<'a>(
        &'a self,
        events: &'a [StoredEvent],
    ) -> impl Iterator<Item = Result<Box<dyn TypedEvent>>> + 'a {
        events.iter().map(move |event| self.decode(event))
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

/// Deserialize a JSON payload for a decoder, tagging failures with the
/// event type's stable tracking code.
///
/// A missing payload is a data-integrity failure here: decoders for
/// payloadless signal events hydrate envelope fields only and never call
/// this helper.
pub fn decode_json_payload<T: DeserializeOwned>(
    event: &StoredEvent,
    tracking_code: &'static str,
) -> Result<T> {
    let payload = event.payload.as_deref().ok_or_else(|| Error::Decode {
        tracking_code,
        source: "payload missing".into(),
    })?;
    serde_json::from_slice(payload).map_err(|err| Error::decode(tracking_code, err))
}
