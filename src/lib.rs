//! Warden - event-sourced storage core for identity and access management.
//!
//! An append-only event log per aggregate backed by a relational store.
//! Pushes are atomic with optimistic concurrency and cross-aggregate unique
//! constraints; reads compile a storage-agnostic condition model into the
//! target SQL dialect and reconstruct typed domain events through an
//! event-type registry.

pub mod error;
pub mod event;
pub mod registry;
pub mod search;
pub mod store;
pub mod unique;

pub use error::{Error, Result};
pub use event::{Aggregate, Editor, HasEnvelope, PushEvent, StoredEvent, TypedEvent};
pub use registry::{decode_json_payload, EventDecoder, EventTypeRegistry, RegistryBuilder};
pub use search::{Field, Filter, Operation, SearchQuery, Value};
#[cfg(feature = "postgres")]
pub use store::PostgresEventStore;
pub use store::{
    push_with_deadline, query_with_deadline, Dialect, EventStore, MemoryEventStore,
    PostgresDialect,
};
pub use unique::{UniqueConstraint, UniqueConstraintAction};
