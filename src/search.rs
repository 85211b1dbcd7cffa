//! Storage-agnostic query model.
//!
//! Fields and operations form a closed vocabulary with an explicit
//! `Unspecified` variant handled at every mapping boundary. Conditions
//! compose by conjunction only; callers needing OR-semantics issue multiple
//! queries. Construction is pure data, no side effects.

use crate::error::{Error, Result};

/// Queryable fields of a stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Unspecified,
    AggregateType,
    AggregateId,
    LatestSequence,
    ResourceOwner,
    EditorService,
    EditorUser,
    EventType,
}

/// Comparison operations on a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Unspecified,
    Equals,
    Greater,
    Less,
    In,
}

/// Bindable parameter payload of a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Number(i64),
    TextList(Vec<String>),
}

/// A `(Field, Operation, Value)` triple, built without knowledge of physical
/// column names or SQL syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    field: Field,
    operation: Operation,
    value: Value,
}

impl Filter {
    /// Build a filter, rejecting the `Unspecified` sentinel of either
    /// enumeration. This is a programmer error signaled at construction,
    /// not deferred to the dialect translator.
    pub fn new(field: Field, operation: Operation, value: Value) -> Result<Self> {
        if field == Field::Unspecified {
            return Err(Error::Unsupported {
                reason: "filter field is unspecified".to_string(),
            });
        }
        if operation == Operation::Unspecified {
            return Err(Error::Unsupported {
                reason: "filter operation is unspecified".to_string(),
            });
        }
        Ok(Self {
            field,
            operation,
            value,
        })
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// A conjunction of filters plus pagination, built via chained constructors.
///
/// The convenience constructors only produce filters from the closed
/// enumerations, so they cannot fail; arbitrary filters go through
/// [`Filter::new`] and [`SearchQuery::filter`].
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    filters: Vec<Filter>,
    limit: Option<u64>,
    descending: bool,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an already-validated filter; filters compose by conjunction.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn aggregate_type(self, aggregate_type: impl Into<String>) -> Self {
        self.push(Field::AggregateType, Operation::Equals, Value::Text(aggregate_type.into()))
    }

    pub fn aggregate_types(self, aggregate_types: Vec<String>) -> Self {
        self.push(Field::AggregateType, Operation::In, Value::TextList(aggregate_types))
    }

    pub fn aggregate_id(self, id: impl Into<String>) -> Self {
        self.push(Field::AggregateId, Operation::Equals, Value::Text(id.into()))
    }

    pub fn event_type(self, event_type: impl Into<String>) -> Self {
        self.push(Field::EventType, Operation::Equals, Value::Text(event_type.into()))
    }

    pub fn event_types(self, event_types: Vec<String>) -> Self {
        self.push(Field::EventType, Operation::In, Value::TextList(event_types))
    }

    pub fn resource_owner(self, resource_owner: impl Into<String>) -> Self {
        self.push(Field::ResourceOwner, Operation::Equals, Value::Text(resource_owner.into()))
    }

    pub fn editor_service(self, service: impl Into<String>) -> Self {
        self.push(Field::EditorService, Operation::Equals, Value::Text(service.into()))
    }

    pub fn editor_user(self, user_id: impl Into<String>) -> Self {
        self.push(Field::EditorUser, Operation::Equals, Value::Text(user_id.into()))
    }

    /// Only events with a sequence strictly greater than `sequence`.
    pub fn sequence_greater(self, sequence: u64) -> Self {
        self.push(Field::LatestSequence, Operation::Greater, Value::Number(sequence as i64))
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reverse the implicit ascending ordering.
    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn is_descending(&self) -> bool {
        self.descending
    }

    fn push(mut self, field: Field, operation: Operation, value: Value) -> Self {
        self.filters.push(Filter {
            field,
            operation,
            value,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_rejects_unspecified_field() {
        let result = Filter::new(
            Field::Unspecified,
            Operation::Equals,
            Value::Text("user".to_string()),
        );
        assert!(matches!(result, Err(Error::Unsupported { .. })));
    }

    #[test]
    fn filter_rejects_unspecified_operation() {
        let result = Filter::new(
            Field::AggregateType,
            Operation::Unspecified,
            Value::Text("user".to_string()),
        );
        assert!(matches!(result, Err(Error::Unsupported { .. })));
    }

    #[test]
    fn filter_accepts_enumerated_pair() {
        let filter = Filter::new(
            Field::LatestSequence,
            Operation::Greater,
            Value::Number(12),
        )
        .unwrap();
        assert_eq!(filter.field(), Field::LatestSequence);
        assert_eq!(filter.operation(), Operation::Greater);
        assert_eq!(filter.value(), &Value::Number(12));
    }

    #[test]
    fn query_composes_by_conjunction() {
        let query = SearchQuery::new()
            .aggregate_type("user")
            .aggregate_id("u-1")
            .event_types(vec!["user.added".to_string(), "user.removed".to_string()])
            .sequence_greater(4)
            .limit(10);

        assert_eq!(query.filters().len(), 4);
        assert_eq!(query.limit_value(), Some(10));
        assert!(!query.is_descending());
        assert_eq!(query.filters()[3].operation(), Operation::Greater);
    }
}
