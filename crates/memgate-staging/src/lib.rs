//! MemGate staging subsystem
//!
//! Durable staging area for agent memories whose confidence lands in an
//! uncertain band, plus the admission queue that reviews them.
//!
//! # Design
//!
//! - One staged record per memory; `status` is the only coordination point
//! - Every transition is an atomic compare-and-set in the storage backend;
//!   no locks exist above the store
//! - Losing a race is an ordinary outcome (`None` / `false`), never an
//!   error
//!
//! # Backends
//!
//! - `RocksDbStagingStore` - durable, transaction-locked (production)
//! - `InMemoryStagingStore` - lock-per-map (testing)

pub mod options;
pub mod queue;
pub mod record;
pub mod rocks;
pub mod store;

pub use options::StagingOptions;
pub use queue::{AdmissionQueue, QueueStatistics};
pub use record::{NewStagedMemory, StagedMemory, StagedStatus, StagedSummary};
pub use rocks::RocksDbStagingStore;
pub use store::{
    InMemoryStagingStore, PendingFilter, StagingAggregate, StagingStore, StatusUpdate,
};
