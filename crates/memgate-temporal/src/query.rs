//! Temporal query specification and clause compilation

use crate::filter::{field, CompareOp, FilterClause};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bi-temporal query over the durable store
///
/// Transient: constructed per read request, compiled to predicate clauses,
/// discarded. `as_of` wins over range bounds when both are set; expired
/// records are excluded by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalQuery {
    /// Point-in-time query: what was valid at this instant
    pub as_of: Option<DateTime<Utc>>,

    /// Inclusive lower bound on `valid_at`
    pub start_time: Option<DateTime<Utc>>,

    /// Inclusive upper bound on `valid_at`
    pub end_time: Option<DateTime<Utc>>,

    /// Exclude records already expired at compile time
    pub filter_expired: bool,

    /// Caller-supplied clauses, appended verbatim after the temporal ones
    pub extra_clauses: Vec<FilterClause>,
}

impl Default for TemporalQuery {
    /// Filter only by expiry; records without temporal fields stay queryable
    fn default() -> Self {
        Self {
            as_of: None,
            start_time: None,
            end_time: None,
            filter_expired: true,
            extra_clauses: Vec::new(),
        }
    }
}

impl TemporalQuery {
    /// What was valid at a given instant
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            as_of: Some(instant),
            ..Default::default()
        }
    }

    /// What became valid within a range (inclusive on both ends)
    pub fn between(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self {
            start_time: start,
            end_time: end,
            ..Default::default()
        }
    }

    /// Only records valid right now
    pub fn currently_valid() -> Self {
        Self::at(Utc::now())
    }

    /// No temporal filtering at all
    pub fn unfiltered() -> Self {
        Self {
            filter_expired: false,
            ..Default::default()
        }
    }

    /// Builder: toggle expiry filtering
    pub fn filter_expired(mut self, filter: bool) -> Self {
        self.filter_expired = filter;
        self
    }

    /// Builder: append a caller-supplied clause
    pub fn with_clause(mut self, clause: FilterClause) -> Self {
        self.extra_clauses.push(clause);
        self
    }

    /// Compile to an ordered list of predicate clauses
    ///
    /// Branches, first match wins:
    /// 1. `as_of` set: validity clause (`valid_at` null or <= t) and strict
    ///    expiry clause (`expires_at` null or > t); range bounds and the
    ///    expiry flag are ignored
    /// 2. either range bound set: inclusive range on `valid_at`, plus an
    ///    expiry-at-`now` clause when `filter_expired`
    /// 3. `filter_expired`: expiry-at-`now` clause alone
    /// 4. otherwise: no temporal clauses
    ///
    /// Extra clauses are always appended last, in caller order.
    pub fn compile(&self, now: DateTime<Utc>) -> Vec<FilterClause> {
        let mut clauses = Vec::new();

        if let Some(t) = self.as_of {
            // Null valid_at means valid since creation
            clauses.push(FilterClause::any_of(vec![
                FilterClause::is_null(field::VALID_AT),
                FilterClause::compare(field::VALID_AT, CompareOp::Lte, t),
            ]));
            // Null expires_at means never expires
            clauses.push(FilterClause::any_of(vec![
                FilterClause::is_null(field::EXPIRES_AT),
                FilterClause::compare(field::EXPIRES_AT, CompareOp::Gt, t),
            ]));
        } else if self.start_time.is_some() || self.end_time.is_some() {
            clauses.push(FilterClause::range(
                field::VALID_AT,
                self.start_time,
                self.end_time,
            ));
            if self.filter_expired {
                clauses.push(Self::not_expired(now));
            }
        } else if self.filter_expired {
            clauses.push(Self::not_expired(now));
        }

        clauses.extend(self.extra_clauses.iter().cloned());
        clauses
    }

    /// Compile against the current instant
    pub fn compile_now(&self) -> Vec<FilterClause> {
        self.compile(Utc::now())
    }

    fn not_expired(now: DateTime<Utc>) -> FilterClause {
        FilterClause::any_of(vec![
            FilterClause::is_null(field::EXPIRES_AT),
            FilterClause::compare(field::EXPIRES_AT, CompareOp::Gte, now),
        ])
    }
}
