//! Predicate clauses for bi-temporal queries
//!
//! The abstract clause structure handed to the durable store's filter
//! evaluator. Consumers need to support exactly three things: null checks,
//! inclusive range comparisons, and logical-OR grouping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Field names of the durable store's temporal columns
pub mod field {
    /// When a memory became valid; null means valid since creation
    pub const VALID_AT: &str = "valid_at";

    /// When a memory stops being valid; null means never expires
    pub const EXPIRES_AT: &str = "expires_at";
}

/// Comparison operators for timestamp predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

impl CompareOp {
    /// Evaluate `lhs <op> rhs`
    pub fn holds(&self, lhs: DateTime<Utc>, rhs: DateTime<Utc>) -> bool {
        match self {
            CompareOp::Lt => lhs < rhs,
            CompareOp::Lte => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Gte => lhs >= rhs,
            CompareOp::Eq => lhs == rhs,
        }
    }
}

/// A single predicate clause over a temporal field
///
/// Clauses in a compiled list are implicitly AND-ed; `AnyOf` provides the
/// OR grouping the null-handling semantics need. `Compare` and `Range`
/// follow SQL comparison semantics: a null field never satisfies them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterClause {
    /// The field is null
    IsNull { field: String },

    /// The field compares against a fixed instant
    Compare {
        field: String,
        op: CompareOp,
        value: DateTime<Utc>,
    },

    /// The field lies within an inclusive range; missing bounds are open
    Range {
        field: String,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },

    /// At least one inner clause holds
    AnyOf(Vec<FilterClause>),
}

impl FilterClause {
    /// Null-check clause
    pub fn is_null(field: &str) -> Self {
        FilterClause::IsNull {
            field: field.to_string(),
        }
    }

    /// Comparison clause
    pub fn compare(field: &str, op: CompareOp, value: DateTime<Utc>) -> Self {
        FilterClause::Compare {
            field: field.to_string(),
            op,
            value,
        }
    }

    /// Inclusive range clause with optional bounds
    pub fn range(field: &str, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        FilterClause::Range {
            field: field.to_string(),
            start,
            end,
        }
    }

    /// OR-group of clauses
    pub fn any_of(clauses: Vec<FilterClause>) -> Self {
        FilterClause::AnyOf(clauses)
    }

    /// Evaluate this clause against a document
    pub fn matches<D: TemporalDocument>(&self, doc: &D) -> bool {
        match self {
            FilterClause::IsNull { field } => doc.timestamp_field(field).is_none(),
            FilterClause::Compare { field, op, value } => doc
                .timestamp_field(field)
                .is_some_and(|actual| op.holds(actual, *value)),
            FilterClause::Range { field, start, end } => {
                doc.timestamp_field(field).is_some_and(|actual| {
                    start.is_none_or(|s| actual >= s) && end.is_none_or(|e| actual <= e)
                })
            }
            FilterClause::AnyOf(clauses) => clauses.iter().any(|c| c.matches(doc)),
        }
    }
}

/// Evaluate a compiled clause list (implicit AND) against a document
pub fn matches_all<D: TemporalDocument>(clauses: &[FilterClause], doc: &D) -> bool {
    clauses.iter().all(|c| c.matches(doc))
}

/// A document exposing nullable timestamp fields
///
/// `None` means the field is null (or missing, which reads the same way).
/// This is the seam the durable store's evaluator plugs into; the map
/// implementation below is enough for tests and small in-process consumers.
pub trait TemporalDocument {
    fn timestamp_field(&self, name: &str) -> Option<DateTime<Utc>>;
}

impl TemporalDocument for HashMap<String, Option<DateTime<Utc>>> {
    fn timestamp_field(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn doc(
        valid_at: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
    ) -> HashMap<String, Option<DateTime<Utc>>> {
        let mut map = HashMap::new();
        map.insert(field::VALID_AT.to_string(), valid_at);
        map.insert(field::EXPIRES_AT.to_string(), expires_at);
        map
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_is_null_matches_only_null() {
        let clause = FilterClause::is_null(field::VALID_AT);
        assert!(clause.matches(&doc(None, None)));
        assert!(!clause.matches(&doc(Some(Utc::now()), None)));
    }

    #[test]
    fn test_compare_never_matches_null() {
        let clause = FilterClause::compare(field::VALID_AT, CompareOp::Lte, Utc::now());
        assert!(!clause.matches(&doc(None, None)));
    }

    #[test]
    fn test_compare_inclusive_boundary() {
        let t = at("2025-01-15T00:00:00Z");
        let clause = FilterClause::compare(field::VALID_AT, CompareOp::Lte, t);
        assert!(clause.matches(&doc(Some(t), None)));
        assert!(!clause.matches(&doc(Some(t + chrono::Duration::seconds(1)), None)));
    }

    #[test]
    fn test_range_bounds_inclusive() {
        let start = at("2025-01-01T00:00:00Z");
        let end = at("2025-01-31T00:00:00Z");
        let clause = FilterClause::range(field::VALID_AT, Some(start), Some(end));

        assert!(clause.matches(&doc(Some(start), None)));
        assert!(clause.matches(&doc(Some(end), None)));
        assert!(!clause.matches(&doc(Some(end + chrono::Duration::seconds(1)), None)));
        assert!(!clause.matches(&doc(None, None)));
    }

    #[test]
    fn test_range_open_bounds() {
        let start = at("2025-01-01T00:00:00Z");
        let clause = FilterClause::range(field::VALID_AT, Some(start), None);
        assert!(clause.matches(&doc(Some(at("2030-06-01T00:00:00Z")), None)));
        assert!(!clause.matches(&doc(Some(at("2024-12-31T23:59:59Z")), None)));
    }

    #[test]
    fn test_any_of_or_semantics() {
        let t = Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap();
        let clause = FilterClause::any_of(vec![
            FilterClause::is_null(field::EXPIRES_AT),
            FilterClause::compare(field::EXPIRES_AT, CompareOp::Gt, t),
        ]);

        // Null expiry: never expires
        assert!(clause.matches(&doc(None, None)));
        // Expires later
        assert!(clause.matches(&doc(None, Some(t + chrono::Duration::days(1)))));
        // Already expired
        assert!(!clause.matches(&doc(None, Some(t - chrono::Duration::days(1)))));
    }

    #[test]
    fn test_matches_all_is_conjunction() {
        let t = at("2025-01-15T00:00:00Z");
        let clauses = vec![
            FilterClause::is_null(field::VALID_AT),
            FilterClause::compare(field::EXPIRES_AT, CompareOp::Gt, t),
        ];

        assert!(matches_all(
            &clauses,
            &doc(None, Some(t + chrono::Duration::days(1)))
        ));
        assert!(!matches_all(&clauses, &doc(None, None)));
    }
}
