//! PostgreSQL EventStore implementation.
//!
//! One transaction per push: sequence validation, unique-constraint
//! directives and row insertion commit or roll back together. Sequence
//! numbers come from the max committed sequence read inside the transaction,
//! so two concurrent pushes to the same aggregate serialize on the events
//! table's primary key and the loser surfaces a conflict. Timestamps are
//! assigned by the database at commit time.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Acquire, PgPool, Postgres, Row, Transaction};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::event::{Aggregate, PushEvent, StoredEvent};
use crate::search::{SearchQuery, Value};
use crate::store::dialect::{compile_condition, Dialect, PostgresDialect};
use crate::store::{schema, EventStore};
use crate::unique::{UniqueConstraint, UniqueConstraintAction};

const EVENT_COLUMNS: &str = "instance_id, resource_owner, aggregate_type, aggregate_id, \
     event_sequence, event_type, revision, creation_date, editor_service, editor_user, event_data";

/// PostgreSQL implementation of EventStore.
pub struct PostgresEventStore {
    pool: PgPool,
    dialect: PostgresDialect,
}

impl PostgresEventStore {
    /// Create a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            dialect: PostgresDialect,
        }
    }

    /// Create the events and unique_constraints tables if missing.
    pub async fn init(&self) -> Result<()> {
        sqlx::raw_sql(schema::CREATE_EVENTS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::raw_sql(schema::CREATE_UNIQUE_CONSTRAINTS_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Max committed sequence for one aggregate, read inside the push
    /// transaction.
    async fn current_sequence(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        aggregate: &Aggregate,
    ) -> Result<u64> {
        let query = self.dialect.placeholder(
            "SELECT MAX(event_sequence) FROM events \
             WHERE instance_id = ? AND resource_owner = ? AND aggregate_type = ? AND aggregate_id = ?",
        );
        let row = sqlx::query(&query)
            .bind(&aggregate.instance_id)
            .bind(&aggregate.resource_owner)
            .bind(&aggregate.aggregate_type)
            .bind(&aggregate.id)
            .fetch_one(&mut **tx)
            .await?;
        let max: Option<i64> = row.get(0);
        Ok(max.unwrap_or(0) as u64)
    }

    async fn apply_constraint(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        constraint: &UniqueConstraint,
    ) -> Result<()> {
        match constraint.action {
            UniqueConstraintAction::Add => {
                let query = self
                    .dialect
                    .placeholder("INSERT INTO unique_constraints (unique_type, unique_field) VALUES (?, ?)");
                let result = sqlx::query(&query)
                    .bind(&constraint.unique_type)
                    .bind(&constraint.unique_field)
                    .execute(&mut **tx)
                    .await;
                match result {
                    Ok(_) => Ok(()),
                    Err(err) if is_unique_violation(&err) => {
                        warn!(
                            unique_type = %constraint.unique_type,
                            "aborting push on unique constraint collision"
                        );
                        Err(Error::UniqueConstraintViolation {
                            message_key: constraint.error_message.clone(),
                        })
                    }
                    Err(err) => Err(err.into()),
                }
            }
            UniqueConstraintAction::Remove => {
                // Idempotent: releasing an absent key is not an error.
                let query = self
                    .dialect
                    .placeholder("DELETE FROM unique_constraints WHERE unique_type = ? AND unique_field = ?");
                sqlx::query(&query)
                    .bind(&constraint.unique_type)
                    .bind(&constraint.unique_field)
                    .execute(&mut **tx)
                    .await?;
                Ok(())
            }
        }
    }

    async fn insert_event(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event: &PushEvent,
        sequence: u64,
    ) -> Result<DateTime<Utc>> {
        let query = self.dialect.placeholder(&format!(
            "INSERT INTO events ({EVENT_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, statement_timestamp(), ?, ?, ?) \
             RETURNING creation_date"
        ));
        let row = sqlx::query(&query)
            .bind(&event.aggregate.instance_id)
            .bind(&event.aggregate.resource_owner)
            .bind(&event.aggregate.aggregate_type)
            .bind(&event.aggregate.id)
            .bind(sequence as i64)
            .bind(&event.event_type)
            .bind(event.revision as i16)
            .bind(&event.editor.service)
            .bind(&event.editor.user_id)
            .bind(event.payload.as_deref())
            .fetch_one(&mut **tx)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    // Another writer committed this sequence first; the
                    // events primary key is what serializes concurrent
                    // pushes to one stream.
                    Error::SequenceConflict {
                        expected: sequence - 1,
                        actual: sequence,
                    }
                } else {
                    err.into()
                }
            })?;
        Ok(row.get("creation_date"))
    }

    /// Compile a search query into SQL with the dialect's placeholders plus
    /// the bind values in source order.
    fn build_query(
        &self,
        search: &SearchQuery,
        select: &str,
        ordered: bool,
    ) -> Result<(String, Vec<Value>)> {
        let mut sql = format!("SELECT {select} FROM events");
        let mut values: Vec<Value> = Vec::with_capacity(search.filters().len() + 1);

        for (i, filter) in search.filters().iter().enumerate() {
            let condition =
                compile_condition(&self.dialect, filter).ok_or_else(|| Error::Unsupported {
                    reason: format!("cannot compile filter on {:?}", filter.field()),
                })?;
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(&condition);
            values.push(filter.value().clone());
        }

        if ordered {
            let direction = if search.is_descending() { "DESC" } else { "ASC" };
            sql.push_str(&format!(
                " ORDER BY creation_date {direction}, event_sequence {direction}"
            ));
            if let Some(limit) = search.limit_value() {
                sql.push_str(" LIMIT ?");
                values.push(Value::Number(limit as i64));
            }
        }

        Ok((self.dialect.placeholder(&sql), values))
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn push(&self, events: Vec<PushEvent>) -> Result<Vec<StoredEvent>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        // Running sequence per distinct aggregate touched by the batch,
        // seeded from the committed max read inside this transaction.
        let mut sequences: HashMap<Aggregate, u64> = HashMap::new();

        let mut stored = Vec::with_capacity(events.len());
        for event in events {
            let current = match sequences.get(&event.aggregate) {
                Some(current) => *current,
                None => self.current_sequence(&mut tx, &event.aggregate).await?,
            };

            if let Some(expected) = event.previous_sequence {
                if expected != current {
                    warn!(
                        aggregate_id = %event.aggregate.id,
                        expected,
                        actual = current,
                        "aborting push on stale sequence expectation"
                    );
                    // Dropping the transaction rolls back the whole batch.
                    return Err(Error::SequenceConflict {
                        expected,
                        actual: current,
                    });
                }
            }

            for constraint in &event.unique_constraints {
                self.apply_constraint(&mut tx, constraint).await?;
            }

            let sequence = current + 1;
            sequences.insert(event.aggregate.clone(), sequence);
            let created_at = self.insert_event(&mut tx, &event, sequence).await?;

            stored.push(StoredEvent {
                aggregate: event.aggregate,
                event_type: event.event_type,
                editor: event.editor,
                revision: event.revision,
                payload: event.payload,
                sequence,
                created_at,
            });
        }

        tx.commit().await?;
        debug!(count = stored.len(), "push committed");

        Ok(stored)
    }

    async fn query(&self, query: &SearchQuery) -> Result<Vec<StoredEvent>> {
        let (sql, values) = self.build_query(query, EVENT_COLUMNS, true)?;

        let mut statement = sqlx::query(&sql);
        for value in values {
            statement = match value {
                Value::Text(text) => statement.bind(text),
                Value::Number(number) => statement.bind(number),
                Value::TextList(list) => statement.bind(list),
            };
        }

        let rows = statement.fetch_all(&self.pool).await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let sequence: i64 = row.get("event_sequence");
            let revision: i16 = row.get("revision");
            events.push(StoredEvent {
                aggregate: Aggregate {
                    instance_id: row.get("instance_id"),
                    resource_owner: row.get("resource_owner"),
                    aggregate_type: row.get("aggregate_type"),
                    id: row.get("aggregate_id"),
                },
                event_type: row.get("event_type"),
                editor: crate::event::Editor {
                    service: row.get("editor_service"),
                    user_id: row.get("editor_user"),
                },
                revision: revision as u16,
                payload: row.get("event_data"),
                sequence: sequence as u64,
                created_at: row.get("creation_date"),
            });
        }

        Ok(events)
    }

    async fn latest_sequence(&self, query: &SearchQuery) -> Result<u64> {
        let (sql, values) = self.build_query(query, "MAX(event_sequence)", false)?;

        let mut statement = sqlx::query(&sql);
        for value in values {
            statement = match value {
                Value::Text(text) => statement.bind(text),
                Value::Number(number) => statement.bind(number),
                Value::TextList(list) => statement.bind(list),
            };
        }

        let row = statement.fetch_one(&self.pool).await?;
        let max: Option<i64> = row.get(0);
        Ok(max.unwrap_or(0) as u64)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}
