//! PostgreSQL storage contract tests using testcontainers.
//!
//! Run with: cargo test --test storage_postgres --features postgres -- --nocapture
//!
//! These tests spin up PostgreSQL in a container, create the schema, and
//! verify the EventStore contract against a real database, including the
//! transactional all-or-nothing behavior the in-memory tests can only
//! approximate.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{push_event, user_aggregate};
use serial_test::serial;
use sqlx::postgres::PgPoolOptions;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    GenericImage, ImageExt,
};
use warden::{Error, EventStore, PostgresEventStore, SearchQuery, UniqueConstraint};

/// Start PostgreSQL container.
///
/// Returns (container, connection_string) where connection_string is suitable
/// for sqlx PgPool connection.
async fn start_postgres() -> (testcontainers::ContainerAsync<GenericImage>, String) {
    // PostgreSQL prints "database system is ready to accept connections"
    // twice: once during initial setup and once when fully ready. Wait for
    // the message, then add a small delay to ensure full readiness.
    let image = GenericImage::new("postgres", "16")
        .with_exposed_port(5432.tcp())
        .with_wait_for(WaitFor::message_on_stdout(
            "database system is ready to accept connections",
        ));

    let container = image
        .with_env_var("POSTGRES_USER", "warden")
        .with_env_var("POSTGRES_PASSWORD", "warden")
        .with_env_var("POSTGRES_DB", "warden")
        .with_startup_timeout(Duration::from_secs(60))
        .start()
        .await
        .expect("Failed to start postgres container");

    tokio::time::sleep(Duration::from_secs(1)).await;

    let host_port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get mapped port");

    let host = container
        .get_host()
        .await
        .expect("Failed to get container host");

    let connection_string = format!("postgres://warden:warden@{}:{}/warden", host, host_port);

    (container, connection_string)
}

async fn start_store() -> (
    testcontainers::ContainerAsync<GenericImage>,
    PostgresEventStore,
) {
    common::init_tracing();
    let (container, connection_string) = start_postgres().await;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&connection_string)
        .await
        .expect("Failed to connect to postgres");
    let store = PostgresEventStore::new(pool);
    store.init().await.expect("Failed to create schema");
    (container, store)
}

#[tokio::test]
#[serial]
async fn push_assigns_sequences_and_store_timestamps() {
    let (_container, store) = start_store().await;
    let aggregate = user_aggregate("u-1");

    let first = store
        .push(vec![
            push_event(&aggregate, "user.added").with_payload(b"{\"name\":\"ada\"}".to_vec()),
            push_event(&aggregate, "user.profile.changed"),
        ])
        .await
        .unwrap();
    assert_eq!(first[0].sequence, 1);
    assert_eq!(first[1].sequence, 2);
    assert!(first[0].created_at <= first[1].created_at);

    let second = store
        .push(vec![push_event(&aggregate, "user.locked").expect_sequence(2)])
        .await
        .unwrap();
    assert_eq!(second[0].sequence, 3);

    let latest = store
        .latest_sequence(&SearchQuery::new().aggregate_id("u-1"))
        .await
        .unwrap();
    assert_eq!(latest, 3);

    // Payload bytes round-trip through the row.
    let events = store
        .query(&SearchQuery::new().event_type("user.added"))
        .await
        .unwrap();
    assert_eq!(events[0].payload.as_deref(), Some(&b"{\"name\":\"ada\"}"[..]));
    assert_eq!(events[0].editor.service, "management-api");
}

#[tokio::test]
#[serial]
async fn stale_expectation_rolls_back_the_whole_batch() {
    let (_container, store) = start_store().await;
    let aggregate = user_aggregate("u-1");
    store
        .push(vec![push_event(&aggregate, "user.added")])
        .await
        .unwrap();

    let err = store
        .push(vec![
            push_event(&user_aggregate("u-2"), "user.added"),
            push_event(&aggregate, "user.locked").expect_sequence(0),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SequenceConflict { .. }));

    // The event for u-2 was inserted before the conflict and must have been
    // rolled back with the rest of the batch.
    let events = store
        .query(&SearchQuery::new().aggregate_id("u-2"))
        .await
        .unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
#[serial]
async fn concurrent_pushes_to_one_stream_elect_one_winner() {
    let (_container, store) = start_store().await;
    let store = Arc::new(store);
    let aggregate = user_aggregate("u-1");
    store
        .push(vec![push_event(&aggregate, "user.added")])
        .await
        .unwrap();

    let left = {
        let store = Arc::clone(&store);
        let event = push_event(&aggregate, "user.email.changed").expect_sequence(1);
        tokio::spawn(async move { store.push(vec![event]).await })
    };
    let right = {
        let store = Arc::clone(&store);
        let event = push_event(&aggregate, "user.phone.changed").expect_sequence(1);
        tokio::spawn(async move { store.push(vec![event]).await })
    };

    let (left, right) = (left.await.unwrap(), right.await.unwrap());
    assert_eq!(left.is_ok() as u8 + right.is_ok() as u8, 1);
    let loser = if left.is_err() { left } else { right };
    assert!(matches!(loser.unwrap_err(), Error::SequenceConflict { .. }));

    let events = store
        .query(&SearchQuery::new().aggregate_id("u-1"))
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].sequence, 2);
}

#[tokio::test]
#[serial]
async fn unique_constraints_are_exclusive_and_releasable() {
    let (_container, store) = start_store().await;
    let store = Arc::new(store);

    let reserve = |id: &str| {
        push_event(&user_aggregate(id), "user.username.reserved").with_constraint(
            UniqueConstraint::new_add("usernames", "ada", "Errors.User.AlreadyExists"),
        )
    };

    let left = {
        let store = Arc::clone(&store);
        let event = reserve("u-1");
        tokio::spawn(async move { store.push(vec![event]).await })
    };
    let right = {
        let store = Arc::clone(&store);
        let event = reserve("u-2");
        tokio::spawn(async move { store.push(vec![event]).await })
    };

    let (left, right) = (left.await.unwrap(), right.await.unwrap());
    assert_eq!(left.is_ok() as u8 + right.is_ok() as u8, 1);
    let loser = if left.is_err() { left } else { right };
    match loser.unwrap_err() {
        Error::UniqueConstraintViolation { message_key } => {
            assert_eq!(message_key, "Errors.User.AlreadyExists");
        }
        other => panic!("expected unique constraint violation, got {other:?}"),
    }

    // Only the winner's event is visible.
    let reserved = store
        .query(&SearchQuery::new().event_type("user.username.reserved"))
        .await
        .unwrap();
    assert_eq!(reserved.len(), 1);
    let winner_id = reserved[0].aggregate.id.clone();

    // Releasing frees the key for reuse; releasing twice is idempotent.
    for _ in 0..2 {
        store
            .push(vec![
                push_event(&user_aggregate(&winner_id), "user.username.released")
                    .with_constraint(UniqueConstraint::new_remove("usernames", "ada")),
            ])
            .await
            .unwrap();
    }
    store.push(vec![reserve("u-3")]).await.unwrap();
}

#[tokio::test]
#[serial]
async fn query_compiles_conditions_through_the_dialect() {
    let (_container, store) = start_store().await;
    let user = user_aggregate("u-1");
    let other = user_aggregate("u-2");

    store
        .push(vec![
            push_event(&user, "user.added"),
            push_event(&user, "user.profile.changed"),
            push_event(&user, "user.locked"),
            push_event(&other, "user.added"),
        ])
        .await
        .unwrap();

    let events = store
        .query(
            &SearchQuery::new()
                .aggregate_type("user")
                .resource_owner("org-1")
                .aggregate_id("u-1")
                .event_types(vec!["user.added".to_string(), "user.locked".to_string()]),
        )
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, "user.added");
    assert_eq!(events[1].event_type, "user.locked");

    let newest = store
        .query(&SearchQuery::new().aggregate_id("u-1").descending().limit(1))
        .await
        .unwrap();
    assert_eq!(newest.len(), 1);
    assert_eq!(newest[0].sequence, 3);

    let after = store
        .query(&SearchQuery::new().aggregate_id("u-1").sequence_greater(1))
        .await
        .unwrap();
    assert_eq!(after.len(), 2);
}
