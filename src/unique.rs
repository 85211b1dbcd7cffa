//! Declarative unique-constraint directives.
//!
//! Constraints enforce invariants spanning aggregates (e.g. "this name is
//! globally unique") without a dedicated aggregate for the name itself. They
//! are attached to pushed events and applied inside the same transaction as
//! the append: if a reservation collides, the entire push fails.

/// Whether a constraint directive reserves or releases its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueConstraintAction {
    /// Reserve the `(unique_type, unique_field)` pair. Fails the push if the
    /// pair is already reserved.
    Add,
    /// Release the pair. Releasing an absent pair is not an error; cascading
    /// removal flows may race with the original removal.
    Remove,
}

/// A single Add/Remove directive attached to a pushed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueConstraint {
    /// Namespace of the uniqueness rule, e.g. `"usernames"`.
    pub unique_type: String,
    /// The value that must be unique within `unique_type`.
    pub unique_field: String,
    /// Message key surfaced to the caller when an Add collides. Empty for
    /// Remove directives.
    pub error_message: String,
    pub action: UniqueConstraintAction,
}

impl UniqueConstraint {
    /// Directive reserving `unique_field` within `unique_type`.
    pub fn new_add(
        unique_type: impl Into<String>,
        unique_field: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            unique_type: unique_type.into(),
            unique_field: unique_field.into(),
            error_message: error_message.into(),
            action: UniqueConstraintAction::Add,
        }
    }

    /// Directive releasing `unique_field` within `unique_type`.
    pub fn new_remove(unique_type: impl Into<String>, unique_field: impl Into<String>) -> Self {
        Self {
            unique_type: unique_type.into(),
            unique_field: unique_field.into(),
            error_message: String::new(),
            action: UniqueConstraintAction::Remove,
        }
    }
}
