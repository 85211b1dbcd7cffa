//! Storage implementations.
//!
//! The core is a synchronous request/response library: each push is one
//! atomic transaction, each read is one query, and all coordination is
//! delegated to the store's transactional guarantees. No lock or connection
//! is retained across calls.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::event::{PushEvent, StoredEvent};
use crate::search::SearchQuery;

mod dialect;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod schema;

pub use dialect::{compile_condition, Dialect, PostgresDialect};
pub use memory::MemoryEventStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresEventStore;

/// Interface for event persistence.
///
/// Implementations:
/// - `PostgresEventStore`: PostgreSQL storage
/// - `MemoryEventStore`: in-memory storage for tests
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append a batch of events atomically.
    ///
    /// Constraint directives, sequence assignment and row insertion for the
    /// whole batch succeed or fail together; partial persistence is never
    /// observable. Returns the input events enriched with their assigned
    /// sequence and commit timestamp, in input order.
    async fn push(&self, events: Vec<PushEvent>) -> Result<Vec<StoredEvent>>;

    /// Filtered read over the log, ascending by commit order unless the
    /// query requests descending.
    async fn query(&self, query: &SearchQuery) -> Result<Vec<StoredEvent>>;

    /// Current max committed sequence among events matching the query,
    /// 0 when none match. Used to build the next push's expectation.
    async fn latest_sequence(&self, query: &SearchQuery) -> Result<u64>;
}

/// Push with a caller-supplied deadline.
///
/// On expiry the operation aborts cleanly with no partial commit (the
/// transaction is dropped and rolled back) and reports a timeout distinct
/// from any business-logic failure.
pub async fn push_with_deadline(
    store: &dyn EventStore,
    events: Vec<PushEvent>,
    deadline: Duration,
) -> Result<Vec<StoredEvent>> {
    tokio::time::timeout(deadline, store.push(events))
        .await
        .map_err(|_| Error::Timeout { deadline })?
}

/// Query with a caller-supplied deadline.
pub async fn query_with_deadline(
    store: &dyn EventStore,
    query: &SearchQuery,
    deadline: Duration,
) -> Result<Vec<StoredEvent>> {
    tokio::time::timeout(deadline, store.query(query))
        .await
        .map_err(|_| Error::Timeout { deadline })?
}
