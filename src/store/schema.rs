//! Database schema definitions.

/// SQL for creating the events table.
///
/// The `(instance_id, resource_owner, aggregate_type, aggregate_id)` tuple
/// identifies one stream; `event_sequence` is strictly increasing within it.
pub const CREATE_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    instance_id TEXT NOT NULL,
    resource_owner TEXT NOT NULL,
    aggregate_type TEXT NOT NULL,
    aggregate_id TEXT NOT NULL,
    event_sequence BIGINT NOT NULL,
    event_type TEXT NOT NULL,
    revision SMALLINT NOT NULL,
    creation_date TIMESTAMPTZ NOT NULL,
    editor_service TEXT NOT NULL,
    editor_user TEXT NOT NULL,
    event_data BYTEA,
    PRIMARY KEY (instance_id, resource_owner, aggregate_type, aggregate_id, event_sequence)
);

CREATE INDEX IF NOT EXISTS idx_events_event_type ON events(event_type);
"#;

/// SQL for creating the unique constraints table.
///
/// One row per reserved `(unique_type, unique_field)` pair; the primary key
/// is the mechanism that serializes concurrent reservations.
pub const CREATE_UNIQUE_CONSTRAINTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS unique_constraints (
    unique_type TEXT NOT NULL,
    unique_field TEXT NOT NULL,
    PRIMARY KEY (unique_type, unique_field)
);
"#;
