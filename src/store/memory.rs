//! In-memory EventStore implementation.
//!
//! Backs unit and contract tests without a database while enforcing the same
//! sequence, optimistic-concurrency and unique-constraint semantics as the
//! relational stores. A single async mutex stands in for the database's
//! transactional serialization.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{Error, Result};
use crate::event::{Aggregate, PushEvent, StoredEvent};
use crate::search::{Field, Filter, Operation, SearchQuery, Value};
use crate::store::EventStore;
use crate::unique::UniqueConstraintAction;

#[derive(Default)]
struct Inner {
    streams: HashMap<Aggregate, Vec<StoredEvent>>,
    unique: HashSet<(String, String)>,
}

/// Event store holding all state in memory.
#[derive(Default)]
pub struct MemoryEventStore {
    inner: Mutex<Inner>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn push(&self, events: Vec<PushEvent>) -> Result<Vec<StoredEvent>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        let mut inner = self.inner.lock().await;

        // Stage the whole batch first; nothing is committed until every
        // expectation and constraint directive has validated.
        let mut sequences: HashMap<Aggregate, u64> = HashMap::new();
        let mut staged_unique = inner.unique.clone();
        let mut staged = Vec::with_capacity(events.len());
        let now = Utc::now();

        for event in events {
            let current = sequences.entry(event.aggregate.clone()).or_insert_with(|| {
                inner
                    .streams
                    .get(&event.aggregate)
                    .map(|stream| stream.len() as u64)
                    .unwrap_or(0)
            });

            if let Some(expected) = event.previous_sequence {
                if expected != *current {
                    warn!(
                        aggregate_id = %event.aggregate.id,
                        expected,
                        actual = *current,
                        "aborting push on stale sequence expectation"
                    );
                    return Err(Error::SequenceConflict {
                        expected,
                        actual: *current,
                    });
                }
            }

            for constraint in &event.unique_constraints {
                let key = (
                    constraint.unique_type.clone(),
                    constraint.unique_field.clone(),
                );
                match constraint.action {
                    UniqueConstraintAction::Add => {
                        if !staged_unique.insert(key) {
                            return Err(Error::UniqueConstraintViolation {
                                message_key: constraint.error_message.clone(),
                            });
                        }
                    }
                    UniqueConstraintAction::Remove => {
                        staged_unique.remove(&key);
                    }
                }
            }

            *current += 1;
            staged.push(StoredEvent {
                aggregate: event.aggregate,
                event_type: event.event_type,
                editor: event.editor,
                revision: event.revision,
                payload: event.payload,
                sequence: *current,
                created_at: now,
            });
        }

        inner.unique = staged_unique;
        for stored in &staged {
            inner
                .streams
                .entry(stored.aggregate.clone())
                .or_default()
                .push(stored.clone());
        }

        Ok(staged)
    }

    async fn query(&self, query: &SearchQuery) -> Result<Vec<StoredEvent>> {
        let inner = self.inner.lock().await;
        let mut matched: Vec<StoredEvent> = inner
            .streams
            .values()
            .flatten()
            .filter(|event| query.filters().iter().all(|f| matches_filter(event, f)))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            (a.created_at, a.sequence).cmp(&(b.created_at, b.sequence))
        });
        if query.is_descending() {
            matched.reverse();
        }
        if let Some(limit) = query.limit_value() {
            matched.truncate(limit as usize);
        }
        Ok(matched)
    }

    async fn latest_sequence(&self, query: &SearchQuery) -> Result<u64> {
        let inner = self.inner.lock().await;
        Ok(inner
            .streams
            .values()
            .flatten()
            .filter(|event| query.filters().iter().all(|f| matches_filter(event, f)))
            .map(|event| event.sequence)
            .max()
            .unwrap_or(0))
    }
}

fn matches_filter(event: &StoredEvent, filter: &Filter) -> bool {
    match filter.field() {
        Field::AggregateId => matches_text(filter, &event.aggregate.id),
        Field::AggregateType => matches_text(filter, &event.aggregate.aggregate_type),
        Field::ResourceOwner => matches_text(filter, &event.aggregate.resource_owner),
        Field::EditorService => matches_text(filter, &event.editor.service),
        Field::EditorUser => matches_text(filter, &event.editor.user_id),
        Field::EventType => matches_text(filter, &event.event_type),
        Field::LatestSequence => match (filter.operation(), filter.value()) {
            (Operation::Equals, Value::Number(n)) => event.sequence == *n as u64,
            (Operation::Greater, Value::Number(n)) => event.sequence > *n as u64,
            (Operation::Less, Value::Number(n)) => event.sequence < *n as u64,
            _ => false,
        },
        Field::Unspecified => false,
    }
}

fn matches_text(filter: &Filter, actual: &str) -> bool {
    match (filter.operation(), filter.value()) {
        (Operation::Equals, Value::Text(expected)) => actual == expected,
        (Operation::In, Value::TextList(list)) => list.iter().any(|t| t == actual),
        _ => false,
    }
}
