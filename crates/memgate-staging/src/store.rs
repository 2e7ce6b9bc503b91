//! Staging storage abstraction and in-memory implementation
//!
//! The store is the concurrency-control surface for admission: every status
//! transition goes through `compare_and_set_status`, a single atomic
//! conditional update. No locks exist above this layer.

use crate::record::{StagedMemory, StagedStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memgate_core::{MemoryId, Result};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Accompanying field writes for a status transition
///
/// `updated_at` is always refreshed by the store; approve/reject transitions
/// additionally record the deciding actor and instant.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    /// The target status
    pub status: StagedStatus,

    /// Actor recorded in `approved_by` (used for both approval and rejection)
    pub actor: Option<String>,

    /// Instant recorded in `approved_at`
    pub decided_at: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    /// A bare status move (lock/unlock)
    pub fn to(status: StagedStatus) -> Self {
        Self {
            status,
            actor: None,
            decided_at: None,
        }
    }

    /// A terminal decision recording the actor
    pub fn decided(status: StagedStatus, actor: &str) -> Self {
        Self {
            status,
            actor: Some(actor.to_string()),
            decided_at: Some(Utc::now()),
        }
    }

    /// Apply this update to a record, refreshing `updated_at`
    pub(crate) fn apply(&self, record: &mut StagedMemory) {
        record.status = self.status;
        record.updated_at = Utc::now();
        if let Some(actor) = &self.actor {
            record.approved_by = Some(actor.clone());
        }
        if let Some(decided_at) = self.decided_at {
            record.approved_at = Some(decided_at);
        }
    }
}

/// Filters for listing pending records
#[derive(Debug, Clone, Default)]
pub struct PendingFilter {
    /// Only records in this layer
    pub layer: Option<String>,

    /// Only records with at least this confidence
    pub min_confidence: Option<f64>,
}

impl PendingFilter {
    /// No filtering beyond `status = pending`
    pub fn all() -> Self {
        Self::default()
    }

    /// Builder: restrict to a layer
    pub fn layer(mut self, layer: &str) -> Self {
        self.layer = Some(layer.to_string());
        self
    }

    /// Builder: restrict to a minimum confidence
    pub fn min_confidence(mut self, min: f64) -> Self {
        self.min_confidence = Some(min);
        self
    }

    pub(crate) fn matches(&self, record: &StagedMemory) -> bool {
        if record.status != StagedStatus::Pending {
            return false;
        }
        if let Some(layer) = &self.layer {
            if &record.layer != layer {
                return false;
            }
        }
        if let Some(min) = self.min_confidence {
            if record.confidence < min {
                return false;
            }
        }
        true
    }
}

/// Aggregate counts over the staging store
#[derive(Debug, Clone, PartialEq)]
pub struct StagingAggregate {
    /// Number of pending records
    pub pending: usize,

    /// Pending record counts grouped by layer
    pub by_layer: HashMap<String, usize>,

    /// Mean confidence among pending records, 0.0 if none
    pub mean_confidence: f64,
}

/// Sort pending records by confidence descending, then recency descending
///
/// Presentation order only: concurrent inserts may reorder results between
/// successive calls.
pub(crate) fn sort_pending(records: &mut [StagedMemory]) {
    records.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

/// Trait for staging storage backends
///
/// This abstraction allows for different storage implementations:
/// - In-memory (for testing)
/// - RocksDB (for production)
///
/// All mutations are single-record atomic operations; correctness of the
/// admission state machine rests on `compare_and_set_status` being atomic
/// in the backend.
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Insert a new record. Fails with `DuplicateId` if the id exists.
    async fn create(&self, record: StagedMemory) -> Result<()>;

    /// Get a record by id
    async fn find(&self, id: MemoryId) -> Result<Option<StagedMemory>>;

    /// List pending records matching the filter, ordered by confidence
    /// descending then recency descending, bounded by `limit`
    async fn list_pending(
        &self,
        filter: &PendingFilter,
        limit: usize,
    ) -> Result<Vec<StagedMemory>>;

    /// List all records with a given status (reaper scan surface)
    async fn list_by_status(&self, status: StagedStatus) -> Result<Vec<StagedMemory>>;

    /// Atomically update status (and accompanying fields) only if the
    /// current status is one of `expected`. Returns the post-update record
    /// when the transition committed, `None` when the precondition failed
    /// or the record does not exist. This is the sole concurrency-control
    /// primitive, and its return value is the only authoritative report of
    /// the transition: callers must not re-read to learn the outcome, since
    /// the record may be deleted by the time a second call observes it.
    async fn compare_and_set_status(
        &self,
        id: MemoryId,
        expected: &[StagedStatus],
        update: StatusUpdate,
    ) -> Result<Option<StagedMemory>>;

    /// Remove the record; idempotent. Returns whether a row was removed.
    async fn delete(&self, id: MemoryId) -> Result<bool>;

    /// Aggregate counts over pending records
    async fn aggregate(&self) -> Result<StagingAggregate>;

    /// Flush any buffered writes. Backends whose writes are durable at
    /// commit time may treat this as a no-op.
    async fn flush(&self) -> Result<()>;

    /// Close the storage (for clean shutdown)
    async fn close(&self) -> Result<()>;
}

/// In-memory staging store for testing
///
/// Compare-and-set atomicity comes from holding the write lock across the
/// read-check-write; the RocksDB store gets the same guarantee from
/// transaction key locks.
pub struct InMemoryStagingStore {
    records: tokio::sync::RwLock<HashMap<MemoryId, StagedMemory>>,
}

impl InMemoryStagingStore {
    /// Create a new in-memory staging store
    pub fn new() -> Self {
        Self {
            records: tokio::sync::RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStagingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StagingStore for InMemoryStagingStore {
    async fn create(&self, record: StagedMemory) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(memgate_core::Error::DuplicateId(record.id.to_string()));
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn find(&self, id: MemoryId) -> Result<Option<StagedMemory>> {
        let records = self.records.read().await;
        Ok(records.get(&id).cloned())
    }

    async fn list_pending(
        &self,
        filter: &PendingFilter,
        limit: usize,
    ) -> Result<Vec<StagedMemory>> {
        let records = self.records.read().await;
        let mut matched: Vec<StagedMemory> = records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        sort_pending(&mut matched);
        matched.truncate(limit);
        Ok(matched)
    }

    async fn list_by_status(&self, status: StagedStatus) -> Result<Vec<StagedMemory>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect())
    }

    async fn compare_and_set_status(
        &self,
        id: MemoryId,
        expected: &[StagedStatus],
        update: StatusUpdate,
    ) -> Result<Option<StagedMemory>> {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(record) if expected.contains(&record.status) => {
                update.apply(record);
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, id: MemoryId) -> Result<bool> {
        let mut records = self.records.write().await;
        Ok(records.remove(&id).is_some())
    }

    async fn aggregate(&self) -> Result<StagingAggregate> {
        let records = self.records.read().await;
        let pending: Vec<&StagedMemory> = records
            .values()
            .filter(|r| r.status == StagedStatus::Pending)
            .collect();

        let mut by_layer: HashMap<String, usize> = HashMap::new();
        let mut confidence_sum = 0.0;
        for record in &pending {
            *by_layer.entry(record.layer.clone()).or_insert(0) += 1;
            confidence_sum += record.confidence;
        }
        let mean_confidence = if pending.is_empty() {
            0.0
        } else {
            confidence_sum / pending.len() as f64
        };

        Ok(StagingAggregate {
            pending: pending.len(),
            by_layer,
            mean_confidence,
        })
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
