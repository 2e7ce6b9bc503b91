//! MemGate - staged admission and bi-temporal querying for agent memories
//!
//! This is the main library crate that re-exports all MemGate components.
//!
//! Agent-generated memories arrive with a confidence score. An upstream
//! admission policy routes uncertain ones into the staging queue, where a
//! reviewer locks, then approves (index into the durable store, delete from
//! staging) or rejects them. Read paths query the durable store through
//! compiled temporal filter clauses.

pub use memgate_core as core;
pub use memgate_staging as staging;
pub use memgate_temporal as temporal;

// Re-export commonly used types
pub use memgate_core::{Error, MemoryId, Result};
pub use memgate_staging::{
    AdmissionQueue, InMemoryStagingStore, NewStagedMemory, PendingFilter, QueueStatistics,
    RocksDbStagingStore, StagedMemory, StagedStatus, StagedSummary, StagingOptions, StagingStore,
};
pub use memgate_temporal::{
    parse_temporal_params, CompareOp, FilterClause, RawTemporalParams, TemporalQuery,
    TimestampParsing,
};
