//! Parsing raw temporal parameters from string boundaries
//!
//! Read paths arriving over HTTP (or any stringly boundary) carry their
//! temporal intent as ISO-8601 strings. This module turns them into a
//! `TemporalQuery`, with a configurable stance on garbage input.

use crate::query::TemporalQuery;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use memgate_core::{Error, Result};
use tracing::warn;

/// Raw, unparsed temporal parameters as received at the boundary
#[derive(Debug, Clone, Default)]
pub struct RawTemporalParams {
    /// Point-in-time instant; wins over the range bounds when it parses
    pub as_of: Option<String>,

    /// Inclusive range start
    pub start_time: Option<String>,

    /// Inclusive range end
    pub end_time: Option<String>,

    /// Explicit request to include expired records
    pub include_expired: bool,
}

/// How to treat unparseable timestamp strings
///
/// `Lenient` mirrors the long-standing boundary behavior of degrading
/// garbage to "absent"; `Strict` rejects the request instead. Empty strings
/// are absent under both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampParsing {
    #[default]
    Lenient,
    Strict,
}

/// Parse one ISO-8601 timestamp string
///
/// Accepts RFC 3339 (a trailing `Z` reads as +00:00), offset-less
/// date-times, and bare dates (midnight UTC). Returns `None` for anything
/// else.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

fn parse_field(
    name: &str,
    raw: Option<&str>,
    mode: TimestampParsing,
) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    match parse_timestamp(raw) {
        Some(t) => Ok(Some(t)),
        None => match mode {
            TimestampParsing::Lenient => {
                warn!("Ignoring unparseable {} timestamp: {:?}", name, raw);
                Ok(None)
            }
            TimestampParsing::Strict => Err(Error::InvalidTimestamp(format!(
                "Unparseable {} timestamp: {:?}",
                name, raw
            ))),
        },
    }
}

/// Build a temporal query from raw string parameters
///
/// A parsed `as_of` takes precedence over the range bounds even when both
/// are supplied. `include_expired` with no `as_of`/range yields the
/// unfiltered query; nothing supplied yields the expiry-only default, which
/// keeps records created before temporal fields existed queryable.
pub fn parse_temporal_params(
    raw: &RawTemporalParams,
    mode: TimestampParsing,
) -> Result<TemporalQuery> {
    if let Some(as_of) = parse_field("as_of", raw.as_of.as_deref(), mode)? {
        return Ok(TemporalQuery::at(as_of));
    }

    let start = parse_field("start_time", raw.start_time.as_deref(), mode)?;
    let end = parse_field("end_time", raw.end_time.as_deref(), mode)?;
    if start.is_some() || end.is_some() {
        return Ok(TemporalQuery::between(start, end).filter_expired(!raw.include_expired));
    }

    if raw.include_expired {
        return Ok(TemporalQuery::unfiltered());
    }
    Ok(TemporalQuery::default())
}
