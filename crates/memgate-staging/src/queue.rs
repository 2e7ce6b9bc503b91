//! Admission queue controller
//!
//! Operations layer over the staging store. Every transition is a single
//! compare-and-set against the record's current status, so any two callers
//! racing on the same id see exactly one winner; losers get `None` / `false`
//! and must re-fetch rather than assume exclusive rights.

use crate::record::{NewStagedMemory, StagedMemory, StagedStatus, StagedSummary};
use crate::store::{PendingFilter, StagingStore, StatusUpdate};
use chrono::{Duration, Utc};
use memgate_core::{MemoryId, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Statistics about the admission queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStatistics {
    /// Number of pending records
    pub pending: usize,

    /// Pending record counts grouped by layer
    pub by_layer: HashMap<String, usize>,

    /// Mean confidence among pending records, rounded to two decimal
    /// places; 0.0 if the queue is empty
    pub mean_confidence: f64,
}

/// Admission queue over a staging store
///
/// The queue decides nothing about *whether* a memory deserves staging --
/// the admission policy does that upstream. It only guards the review
/// lifecycle: pending → processing → approved/rejected → deleted.
pub struct AdmissionQueue {
    store: Arc<dyn StagingStore>,
}

impl AdmissionQueue {
    /// Create a queue over an injected staging store
    pub fn new(store: Arc<dyn StagingStore>) -> Self {
        Self { store }
    }

    /// Access the underlying store
    pub fn store(&self) -> &Arc<dyn StagingStore> {
        &self.store
    }

    // ========== Staging ==========

    /// Stage a new memory for review
    ///
    /// The record enters the queue as `pending`. Fails with `DuplicateId`
    /// if the id is already staged.
    pub async fn add_pending(&self, new: NewStagedMemory) -> Result<StagedSummary> {
        let record = StagedMemory::from_new(new);
        let summary = record.summary();
        self.store.create(record).await?;
        info!(
            "Staged memory {} (layer={}, confidence={:.2})",
            summary.id, summary.layer, summary.confidence
        );
        Ok(summary)
    }

    /// List pending records awaiting review
    pub async fn list_pending(
        &self,
        filter: &PendingFilter,
        limit: usize,
    ) -> Result<Vec<StagedMemory>> {
        self.store.list_pending(filter, limit).await
    }

    /// Get a staged record by id
    pub async fn find(&self, id: MemoryId) -> Result<Option<StagedMemory>> {
        self.store.find(id).await
    }

    // ========== Review lifecycle ==========

    /// Try to claim a pending record for finalization
    ///
    /// Exactly one concurrent caller wins a given pending→processing race
    /// and receives the locked record. `None` means not found *or* already
    /// claimed; treat it as "someone else is handling it", not an error.
    pub async fn try_lock_for_processing(&self, id: MemoryId) -> Result<Option<StagedMemory>> {
        let locked = self
            .store
            .compare_and_set_status(
                id,
                &[StagedStatus::Pending],
                StatusUpdate::to(StagedStatus::Processing),
            )
            .await?;
        if locked.is_none() {
            debug!("Lock attempt on {} lost the race or found nothing", id);
        }
        Ok(locked)
    }

    /// Roll a locked record back to pending after a failed finalize
    ///
    /// Returns whether the unlock changed a row. `false` means the record
    /// already moved on (deleted or finalized elsewhere) and is not an error.
    pub async fn unlock_from_processing(&self, id: MemoryId) -> Result<bool> {
        let unlocked = self
            .store
            .compare_and_set_status(
                id,
                &[StagedStatus::Processing],
                StatusUpdate::to(StagedStatus::Pending),
            )
            .await?;
        if unlocked.is_some() {
            info!("Unlocked {} back to pending after failed finalize", id);
        }
        Ok(unlocked.is_some())
    }

    /// Approve a record, from either pending or processing
    ///
    /// Records the approving actor and instant. Returns the updated record,
    /// or `None` if the status had already moved past pending/processing
    /// (e.g. concurrently rejected) -- in which case a caller that has
    /// speculatively indexed into the durable store must compensate.
    ///
    /// Indexing into the durable store is the caller's job after approval:
    /// index, then `delete_pending`.
    pub async fn approve_pending(
        &self,
        id: MemoryId,
        approved_by: &str,
    ) -> Result<Option<StagedMemory>> {
        self.finalize(id, StagedStatus::Approved, approved_by).await
    }

    /// Reject a record, from either pending or processing
    ///
    /// The rejecting actor lands in the same `approved_by` slot.
    pub async fn reject_pending(
        &self,
        id: MemoryId,
        rejected_by: &str,
    ) -> Result<Option<StagedMemory>> {
        self.finalize(id, StagedStatus::Rejected, rejected_by).await
    }

    // The outcome comes straight from the compare-and-set: a re-read could
    // observe a record already deleted by the winning caller's cleanup and
    // misreport a committed decision as a no-op.
    async fn finalize(
        &self,
        id: MemoryId,
        status: StagedStatus,
        actor: &str,
    ) -> Result<Option<StagedMemory>> {
        let decided = self
            .store
            .compare_and_set_status(
                id,
                &[StagedStatus::Pending, StagedStatus::Processing],
                StatusUpdate::decided(status, actor),
            )
            .await?;
        match &decided {
            Some(_) => info!("Record {} {} by {}", id, status, actor),
            None => debug!("Finalize of {} to {} was a no-op", id, status),
        }
        Ok(decided)
    }

    /// Physically remove a record; idempotent
    ///
    /// Typically called after the caller has finished with a terminal
    /// record (e.g. after indexing an approved memory).
    pub async fn delete_pending(&self, id: MemoryId) -> Result<bool> {
        let removed = self.store.delete(id).await?;
        if removed {
            debug!("Deleted staged record {}", id);
        }
        Ok(removed)
    }

    // ========== Maintenance ==========

    /// Release records stuck in `processing` longer than `older_than`
    ///
    /// A crashed reviewer leaves its claim behind forever; this scan drives
    /// the ordinary processing→pending unlock for each stale record and
    /// returns how many were released. Records that move on between the scan
    /// and the unlock are skipped by the compare-and-set.
    pub async fn release_stale(&self, older_than: Duration) -> Result<usize> {
        let cutoff = Utc::now() - older_than;
        let processing = self.store.list_by_status(StagedStatus::Processing).await?;

        let mut released = 0;
        for record in processing {
            if record.updated_at >= cutoff {
                continue;
            }
            if self.unlock_from_processing(record.id).await? {
                warn!(
                    "Released stale processing record {} (claimed at {})",
                    record.id, record.updated_at
                );
                released += 1;
            }
        }
        Ok(released)
    }

    /// Queue statistics, with mean confidence rounded to two decimals
    pub async fn statistics(&self) -> Result<QueueStatistics> {
        let agg = self.store.aggregate().await?;
        Ok(QueueStatistics {
            pending: agg.pending,
            by_layer: agg.by_layer,
            mean_confidence: (agg.mean_confidence * 100.0).round() / 100.0,
        })
    }
}
