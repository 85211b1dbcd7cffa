//! Shared helpers for EventStore contract tests.

use warden::{Aggregate, Editor, PushEvent};

pub fn user_aggregate(id: &str) -> Aggregate {
    Aggregate::new("inst-1", "org-1", "user", id)
}

pub fn editor() -> Editor {
    Editor::new("management-api", "admin")
}

pub fn push_event(aggregate: &Aggregate, event_type: &str) -> PushEvent {
    PushEvent::new(aggregate.clone(), event_type, editor())
}

/// Install the test tracing subscriber; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
