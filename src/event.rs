//! Event envelope and aggregate reference types.

use chrono::{DateTime, Utc};

use crate::unique::UniqueConstraint;

/// Identifies one event stream.
///
/// The `(instance_id, resource_owner, aggregate_type, id)` tuple uniquely
/// identifies a stream; sequence numbers within it are strictly increasing
/// from 1 with no gaps. Streams are created implicitly by the first event
/// pushed for a new id and are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Aggregate {
    /// Top-level tenancy scope.
    pub instance_id: String,
    /// Tenant/org owning the aggregate.
    pub resource_owner: String,
    /// Aggregate type tag, e.g. `"user"`.
    pub aggregate_type: String,
    /// Aggregate instance id.
    pub id: String,
}

impl Aggregate {
    pub fn new(
        instance_id: impl Into<String>,
        resource_owner: impl Into<String>,
        aggregate_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            resource_owner: resource_owner.into(),
            aggregate_type: aggregate_type.into(),
            id: id.into(),
        }
    }
}

/// Identity of the service and user that caused an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Editor {
    pub service: String,
    pub user_id: String,
}

impl Editor {
    pub fn new(service: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            user_id: user_id.into(),
        }
    }
}

/// An event assembled by a domain module, not yet persisted.
///
/// Payload `None` means "no payload by design" (signal events such as a
/// reservation marker), distinct from an empty byte payload.
#[derive(Debug, Clone)]
pub struct PushEvent {
    pub aggregate: Aggregate,
    pub event_type: String,
    pub editor: Editor,
    /// Schema revision of the payload.
    pub revision: u16,
    pub payload: Option<Vec<u8>>,
    /// Constraint directives applied in the same transaction as the append.
    pub unique_constraints: Vec<UniqueConstraint>,
    /// Optimistic-concurrency assertion: "I observed this aggregate at
    /// sequence S". `Some(0)` asserts the aggregate does not exist yet.
    pub previous_sequence: Option<u64>,
}

impl PushEvent {
    pub fn new(aggregate: Aggregate, event_type: impl Into<String>, editor: Editor) -> Self {
        Self {
            aggregate,
            event_type: event_type.into(),
            editor,
            revision: 1,
            payload: None,
            unique_constraints: Vec::new(),
            previous_sequence: None,
        }
    }

    pub fn with_revision(mut self, revision: u16) -> Self {
        self.revision = revision;
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_constraint(mut self, constraint: UniqueConstraint) -> Self {
        self.unique_constraints.push(constraint);
        self
    }

    pub fn expect_sequence(mut self, previous_sequence: u64) -> Self {
        self.previous_sequence = Some(previous_sequence);
        self
    }
}

/// A committed, immutable envelope read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub aggregate: Aggregate,
    pub event_type: String,
    pub editor: Editor,
    pub revision: u16,
    pub payload: Option<Vec<u8>>,
    /// Sequence within the aggregate stream, assigned at commit.
    pub sequence: u64,
    /// Assigned by the store at commit time; ordering by timestamp agrees
    /// with sequence ordering within an aggregate.
    pub created_at: DateTime<Utc>,
}

/// Access to the stored envelope of a typed event.
pub trait HasEnvelope {
    fn envelope(&self) -> &StoredEvent;

    fn aggregate(&self) -> &Aggregate {
        &self.envelope().aggregate
    }

    fn sequence(&self) -> u64 {
        self.envelope().sequence
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.envelope().created_at
    }
}

/// A domain event reconstructed from a stored row.
///
/// `payload()` returns `None` for signal events that carry no payload by
/// design, distinguishing them from events whose payload failed to parse
/// (which never decode successfully in the first place).
pub trait TypedEvent: HasEnvelope + Send + Sync + std::fmt::Debug {
    fn payload(&self) -> Option<serde_json::Value>;
}
