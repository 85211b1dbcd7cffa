//! SQL dialect translation.
//!
//! Compiles the abstract query model into syntax for one target relational
//! dialect. Every dialect-specific quirk lives here so additional dialects
//! can be added without touching callers. All four mappings are total: an
//! `Unspecified` field or operation maps to the empty sentinel, and callers
//! convert that into an `Unsupported` failure instead of emitting invalid
//! SQL.

use crate::search::{Field, Filter, Operation};

/// The seam for supporting a second relational backend.
pub trait Dialect: Send + Sync {
    /// Rewrite the Nth `?` sentinel to the dialect's positional parameter,
    /// scanning left to right. All other characters pass through untouched.
    /// The abstract query format guarantees markers only appear as parameter
    /// slots, never inside string literals.
    fn placeholder(&self, query: &str) -> String;

    /// Operator token for an operation; empty for `Unspecified`.
    fn operation(&self, operation: Operation) -> &'static str;

    /// Condition template with `{}` slots for column and operator and a `?`
    /// parameter slot.
    fn condition_format(&self, operation: Operation) -> &'static str;

    /// Physical column name for a field; empty for `Unspecified`.
    fn column_name(&self, field: Field) -> &'static str;
}

/// PostgreSQL dialect: `$N` positional parameters, set membership via
/// `= ANY(array)`.
///
/// `In` compiles to the equality operator against a set parameter rather
/// than a dedicated `IN (...)` list; a second dialect may need a genuinely
/// different operator for `In`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn placeholder(&self, query: &str) -> String {
        let mut rewritten = String::with_capacity(query.len());
        let mut index = 0u32;
        for ch in query.chars() {
            if ch == '?' {
                index += 1;
                rewritten.push('$');
                rewritten.push_str(&index.to_string());
            } else {
                rewritten.push(ch);
            }
        }
        rewritten
    }

    fn operation(&self, operation: Operation) -> &'static str {
        match operation {
            Operation::Equals | Operation::In => "=",
            Operation::Greater => ">",
            Operation::Less => "<",
            Operation::Unspecified => "",
        }
    }

    fn condition_format(&self, operation: Operation) -> &'static str {
        match operation {
            Operation::In => "{} {} ANY(?)",
            _ => "{} {} ?",
        }
    }

    fn column_name(&self, field: Field) -> &'static str {
        match field {
            Field::AggregateId => "aggregate_id",
            Field::AggregateType => "aggregate_type",
            Field::EditorService => "editor_service",
            Field::EditorUser => "editor_user",
            Field::EventType => "event_type",
            Field::LatestSequence => "event_sequence",
            Field::ResourceOwner => "resource_owner",
            Field::Unspecified => "",
        }
    }
}

/// Compile one filter into a condition fragment with the `?` sentinel still
/// in place.
///
/// Returns `None` when any mapping yields the empty sentinel; callers must
/// fail the query with `Unsupported` rather than emit invalid SQL.
pub fn compile_condition(dialect: &dyn Dialect, filter: &Filter) -> Option<String> {
    let column = dialect.column_name(filter.field());
    let operator = dialect.operation(filter.operation());
    if column.is_empty() || operator.is_empty() {
        return None;
    }
    let format = dialect.condition_format(filter.operation());
    Some(
        format
            .replacen("{}", column, 1)
            .replacen("{}", operator, 1),
    )
}
