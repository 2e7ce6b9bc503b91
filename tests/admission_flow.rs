//! End-to-end admission flows against a stub durable store
//!
//! Covers the caller-side contract around the staging queue: approve means
//! index-then-delete, and a failed or overtaken finalize must compensate
//! (soft-delete the durable record, unlock the staged one).

use chrono::{DateTime, Duration, Utc};
use memgate::temporal::filter::field;
use memgate::{
    AdmissionQueue, FilterClause, MemoryId, NewStagedMemory, RocksDbStagingStore, StagedMemory,
    StagedStatus, StagingOptions, TemporalQuery,
};
use memgate::temporal::{matches_all, TemporalDocument};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::RwLock;

/// A durable memory record as the search backend would hold it
#[derive(Debug, Clone)]
struct IndexedMemory {
    content: String,
    layer: String,
    active: bool,
    confidence: f64,
    valid_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
}

impl TemporalDocument for IndexedMemory {
    fn timestamp_field(&self, name: &str) -> Option<DateTime<Utc>> {
        match name {
            field::VALID_AT => self.valid_at,
            field::EXPIRES_AT => self.expires_at,
            _ => None,
        }
    }
}

/// Stub durable store with a switchable fault
#[derive(Default)]
struct StubDurableStore {
    records: RwLock<HashMap<MemoryId, IndexedMemory>>,
    fail_indexing: std::sync::atomic::AtomicBool,
}

impl StubDurableStore {
    async fn index_record(&self, staged: &StagedMemory) -> Result<(), String> {
        if self.fail_indexing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err("durable store unreachable".to_string());
        }
        let mut records = self.records.write().await;
        records.insert(
            staged.id,
            IndexedMemory {
                content: staged.content.clone(),
                layer: staged.layer.clone(),
                active: true,
                confidence: staged.confidence,
                valid_at: Some(staged.created_at),
                expires_at: staged.expires_at,
            },
        );
        Ok(())
    }

    async fn set_record_active(&self, id: MemoryId, active: bool) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&id) {
            record.active = active;
        }
    }

    async fn get(&self, id: MemoryId) -> Option<IndexedMemory> {
        self.records.read().await.get(&id).cloned()
    }
}

fn open_queue(dir: &TempDir) -> AdmissionQueue {
    let store = RocksDbStagingStore::open(StagingOptions::for_testing(dir.path())).unwrap();
    AdmissionQueue::new(Arc::new(store))
}

fn new_memory(content: &str, confidence: f64) -> NewStagedMemory {
    NewStagedMemory::new(
        MemoryId::new(),
        content,
        "verified_fact",
        "preference",
        confidence,
        "conversation",
    )
    .unwrap()
    .agent_id("agent-1")
}

#[tokio::test]
async fn approve_indexes_then_deletes() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir);
    let durable = StubDurableStore::default();

    let summary = queue
        .add_pending(new_memory("user prefers concise answers", 0.74))
        .await
        .unwrap();

    let locked = queue
        .try_lock_for_processing(summary.id)
        .await
        .unwrap()
        .unwrap();
    durable.index_record(&locked).await.unwrap();

    let approved = queue
        .approve_pending(summary.id, "reviewer-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(approved.status, StagedStatus::Approved);

    assert!(queue.delete_pending(summary.id).await.unwrap());
    assert!(queue.find(summary.id).await.unwrap().is_none());

    let indexed = durable.get(summary.id).await.unwrap();
    assert!(indexed.active);
    assert_eq!(indexed.content, "user prefers concise answers");
    assert_eq!(indexed.confidence, 0.74);
}

#[tokio::test]
async fn failed_indexing_rolls_back_to_pending() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir);
    let durable = StubDurableStore::default();
    durable
        .fail_indexing
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let summary = queue
        .add_pending(new_memory("fact that fails to index", 0.7))
        .await
        .unwrap();
    let locked = queue
        .try_lock_for_processing(summary.id)
        .await
        .unwrap()
        .unwrap();

    assert!(durable.index_record(&locked).await.is_err());

    // Roll back and leave the record eligible for a future attempt
    assert!(queue.unlock_from_processing(summary.id).await.unwrap());
    let restored = queue.find(summary.id).await.unwrap().unwrap();
    assert_eq!(restored.status, StagedStatus::Pending);
    assert!(restored.updated_at > locked.updated_at);

    // A retry can lock it again
    assert!(queue
        .try_lock_for_processing(summary.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn overtaken_approval_compensates() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir);
    let durable = StubDurableStore::default();

    let summary = queue
        .add_pending(new_memory("contested fact", 0.7))
        .await
        .unwrap();
    let locked = queue
        .try_lock_for_processing(summary.id)
        .await
        .unwrap()
        .unwrap();

    // Speculatively index before finalizing
    durable.index_record(&locked).await.unwrap();

    // Another path rejects the record out from under this reviewer
    let rejected = queue
        .reject_pending(summary.id, "moderator")
        .await
        .unwrap();
    assert!(rejected.is_some());

    // Approval now reports the lost race as a no-op
    let approved = queue
        .approve_pending(summary.id, "reviewer-1")
        .await
        .unwrap();
    assert!(approved.is_none());

    // Compensate: deactivate the durable record, then try to unlock
    durable.set_record_active(summary.id, false).await;
    let unlocked = queue.unlock_from_processing(summary.id).await.unwrap();
    assert!(!unlocked); // already terminal, which is fine

    assert!(!durable.get(summary.id).await.unwrap().active);
    let terminal = queue.find(summary.id).await.unwrap().unwrap();
    assert_eq!(terminal.status, StagedStatus::Rejected);
    assert_eq!(terminal.approved_by.as_deref(), Some("moderator"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reviewers_single_lock_winner() {
    let dir = TempDir::new().unwrap();
    let queue = Arc::new(open_queue(&dir));
    let summary = queue
        .add_pending(new_memory("contended fact", 0.8))
        .await
        .unwrap();
    let id = summary.id;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let queue = Arc::clone(&queue);
        handles.push(tokio::spawn(async move {
            queue.try_lock_for_processing(id).await.unwrap().is_some()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn indexed_records_answer_temporal_queries() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir);
    let durable = StubDurableStore::default();

    let eternal = new_memory("never expires", 0.9);
    let ephemeral =
        new_memory("expires soon", 0.85).expires_at(Utc::now() + Duration::minutes(5));

    for new in [eternal, ephemeral] {
        let summary = queue.add_pending(new).await.unwrap();
        let locked = queue
            .try_lock_for_processing(summary.id)
            .await
            .unwrap()
            .unwrap();
        durable.index_record(&locked).await.unwrap();
        queue
            .approve_pending(summary.id, "reviewer-1")
            .await
            .unwrap()
            .unwrap();
        queue.delete_pending(summary.id).await.unwrap();
    }

    let records = durable.records.read().await;

    // Both valid now
    let now_clauses = TemporalQuery::currently_valid().compile_now();
    let live = records
        .values()
        .filter(|r| matches_all(&now_clauses, *r))
        .count();
    assert_eq!(live, 2);

    // An hour from now the ephemeral one has expired
    let later = Utc::now() + Duration::hours(1);
    let later_clauses = TemporalQuery::at(later).compile(later);
    let still_live: Vec<&IndexedMemory> = records
        .values()
        .filter(|r| matches_all(&later_clauses, *r))
        .collect();
    assert_eq!(still_live.len(), 1);
    assert_eq!(still_live[0].content, "never expires");

    // Extra clauses pass through for caller-defined fields
    let with_extra = TemporalQuery::unfiltered()
        .with_clause(FilterClause::is_null("superseded_at"))
        .compile_now();
    assert_eq!(with_extra.len(), 1);
}
