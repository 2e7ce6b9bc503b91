//! MemGate temporal filter compiler
//!
//! Stateless translation of bi-temporal queries -- "what was valid at t",
//! "what became valid between a and b", "only what is valid now" -- into an
//! ordered list of predicate clauses over the durable store's nullable
//! `valid_at` / `expires_at` columns.
//!
//! Null handling is the whole point: a null `valid_at` means "valid since
//! creation" and a null `expires_at` means "never expires", so every
//! compiled comparison is OR-grouped with the matching null check.

pub mod filter;
pub mod parse;
pub mod query;

pub use filter::{matches_all, CompareOp, FilterClause, TemporalDocument};
pub use parse::{parse_temporal_params, parse_timestamp, RawTemporalParams, TimestampParsing};
pub use query::TemporalQuery;
