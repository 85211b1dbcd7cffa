//! Failure taxonomy for the event store.

use std::time::Duration;

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during event store operations.
///
/// `SequenceConflict`, `Storage` and `Timeout` are transient: the caller may
/// re-read state and retry the whole push or query. The remaining variants are
/// either domain-meaningful rejections (`UniqueConstraintViolation`) or
/// caller/programmer bugs and data-integrity failures that retrying cannot fix.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Sequence conflict: expected {expected}, got {actual}")]
    SequenceConflict { expected: u64, actual: u64 },

    #[error("Unique constraint violation: {message_key}")]
    UniqueConstraintViolation { message_key: String },

    #[error("Unsupported query construct: {reason}")]
    Unsupported { reason: String },

    #[error("Unknown event type: {event_type}")]
    UnknownEventType { event_type: String },

    #[error("Decode failure [{tracking_code}]: {source}")]
    Decode {
        tracking_code: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Deadline of {deadline:?} expired")]
    Timeout { deadline: Duration },
}

impl Error {
    /// Build a decode failure carrying the stable tracking code registered
    /// for the event type.
    pub fn decode(
        tracking_code: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Decode {
            tracking_code,
            source: Box::new(source),
        }
    }

    /// Whether the caller may safely retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::SequenceConflict { .. } | Error::Timeout { .. } => true,
            #[cfg(feature = "postgres")]
            Error::Database(_) => true,
            _ => false,
        }
    }
}
