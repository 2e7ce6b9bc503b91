//! RocksDB-backed staging store
//!
//! Built on `rocksdb::TransactionDB`: `get_for_update` takes an exclusive
//! lock on the record key, so a compare-and-set is read-check-write inside
//! one engine transaction. Exactly one of any set of racing transitions for
//! a given id commits; the rest observe the post-commit status and bail
//! without updating anything.

use crate::options::StagingOptions;
use crate::record::{StagedMemory, StagedStatus};
use crate::store::{
    sort_pending, PendingFilter, StagingAggregate, StagingStore, StatusUpdate,
};
use async_trait::async_trait;
use memgate_core::{Error, MemoryId, Result};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, ErrorKind, IteratorMode, Options, TransactionDB,
    TransactionDBOptions, TransactionOptions, WriteOptions,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Column family names for the staging store
mod cf {
    /// Staged records keyed by memory id
    pub const STAGED: &str = "staged";

    /// Store metadata (schema version, etc.)
    pub const META: &str = "meta";
}

/// Key prefixes
mod prefix {
    pub const STAGED: u8 = 0x01;
    pub const META: u8 = 0x02;
}

const SCHEMA_VERSION_KEY: &str = "schema_version";
const SCHEMA_VERSION: &[u8] = b"1";

/// Build a staged record key: prefix + 16 uuid bytes
fn staged_key(id: MemoryId) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.push(prefix::STAGED);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Build a metadata key
fn meta_key(name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + name.len());
    key.push(prefix::META);
    key.extend_from_slice(name.as_bytes());
    key
}

/// A lost race on a record lock or commit, as opposed to a storage fault
fn is_lock_conflict(e: &rocksdb::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::Busy | ErrorKind::TimedOut | ErrorKind::TryAgain | ErrorKind::Expired
    )
}

/// RocksDB-backed staging store implementation
pub struct RocksDbStagingStore {
    db: Arc<TransactionDB>,
    options: StagingOptions,
}

impl RocksDbStagingStore {
    /// Open or create a staging store
    pub fn open(options: StagingOptions) -> Result<Self> {
        info!("Opening staging store at {:?}", options.path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(options.create_if_missing);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(options.write_buffer_size);

        if options.enable_compression {
            db_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        }

        let cf_names = [cf::STAGED, cf::META];
        let cf_descriptors: Vec<ColumnFamilyDescriptor> = cf_names
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                if options.enable_compression {
                    cf_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                }
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let txn_db_opts = TransactionDBOptions::default();
        let db =
            TransactionDB::open_cf_descriptors(&db_opts, &txn_db_opts, &options.path, cf_descriptors)
                .map_err(|e| Error::Storage(format!("Failed to open staging store: {}", e)))?;

        let store = Self {
            db: Arc::new(db),
            options,
        };
        store.write_schema_version()?;

        info!("Staging store opened successfully");
        Ok(store)
    }

    fn write_schema_version(&self) -> Result<()> {
        let meta = self.cf(cf::META)?;
        self.db
            .put_cf(meta, meta_key(SCHEMA_VERSION_KEY), SCHEMA_VERSION)
            .map_err(|e| Error::Storage(format!("Failed to write schema version: {}", e)))
    }

    /// Get a reference to a column family
    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Internal(format!("Column family not found: {}", name)))
    }

    fn write_opts(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.options.sync_writes);
        opts
    }

    fn txn_opts(&self) -> TransactionOptions {
        let mut opts = TransactionOptions::default();
        opts.set_lock_timeout(self.options.lock_timeout_ms);
        opts
    }

    fn encode(record: &StagedMemory) -> Result<Vec<u8>> {
        bincode::serialize(record)
            .map_err(|e| Error::Serialization(format!("Failed to serialize record: {}", e)))
    }

    fn decode(bytes: &[u8]) -> Result<StagedMemory> {
        bincode::deserialize(bytes)
            .map_err(|e| Error::Deserialization(format!("Failed to deserialize record: {}", e)))
    }

    /// Scan every staged record, applying `keep` before materializing
    fn scan<F>(&self, keep: F) -> Result<Vec<StagedMemory>>
    where
        F: Fn(&StagedMemory) -> bool,
    {
        let staged = self.cf(cf::STAGED)?;
        let mut records = Vec::new();

        for item in self.db.iterator_cf(staged, IteratorMode::Start) {
            let (_key, value) = item.map_err(|e| Error::Storage(e.to_string()))?;
            let record = Self::decode(&value)?;
            if keep(&record) {
                records.push(record);
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl StagingStore for RocksDbStagingStore {
    async fn create(&self, record: StagedMemory) -> Result<()> {
        let staged = self.cf(cf::STAGED)?;
        let key = staged_key(record.id);
        let value = Self::encode(&record)?;

        let txn = self.db.transaction_opt(&self.write_opts(), &self.txn_opts());
        let existing = txn
            .get_for_update_cf(staged, &key, true)
            .map_err(|e| {
                if is_lock_conflict(&e) {
                    Error::TransactionConflict(format!("Concurrent insert for {}", record.id))
                } else {
                    Error::Storage(e.to_string())
                }
            })?;
        if existing.is_some() {
            return Err(Error::DuplicateId(record.id.to_string()));
        }

        txn.put_cf(staged, &key, &value)
            .map_err(|e| Error::Storage(e.to_string()))?;
        txn.commit().map_err(|e| {
            if is_lock_conflict(&e) {
                Error::TransactionConflict(format!("Concurrent insert for {}", record.id))
            } else {
                Error::Storage(e.to_string())
            }
        })?;

        debug!("Staged record {} (layer={})", record.id, record.layer);
        Ok(())
    }

    async fn find(&self, id: MemoryId) -> Result<Option<StagedMemory>> {
        let staged = self.cf(cf::STAGED)?;
        match self.db.get_cf(staged, staged_key(id)) {
            Ok(Some(value)) => Ok(Some(Self::decode(&value)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }

    async fn list_pending(
        &self,
        filter: &PendingFilter,
        limit: usize,
    ) -> Result<Vec<StagedMemory>> {
        let mut records = self.scan(|r| filter.matches(r))?;
        sort_pending(&mut records);
        records.truncate(limit);
        Ok(records)
    }

    async fn list_by_status(&self, status: StagedStatus) -> Result<Vec<StagedMemory>> {
        self.scan(|r| r.status == status)
    }

    async fn compare_and_set_status(
        &self,
        id: MemoryId,
        expected: &[StagedStatus],
        update: StatusUpdate,
    ) -> Result<Option<StagedMemory>> {
        let staged = self.cf(cf::STAGED)?;
        let key = staged_key(id);

        let txn = self.db.transaction_opt(&self.write_opts(), &self.txn_opts());
        let current = match txn.get_for_update_cf(staged, &key, true) {
            Ok(Some(value)) => Self::decode(&value)?,
            Ok(None) => return Ok(None),
            // Someone else holds the record lock; by the time it is released
            // the precondition has been re-decided, so this caller lost.
            Err(e) if is_lock_conflict(&e) => return Ok(None),
            Err(e) => return Err(Error::Storage(e.to_string())),
        };

        if !expected.contains(&current.status) {
            return Ok(None);
        }

        let mut next = current;
        update.apply(&mut next);
        txn.put_cf(staged, &key, Self::encode(&next)?)
            .map_err(|e| Error::Storage(e.to_string()))?;

        match txn.commit() {
            Ok(()) => {
                debug!("Record {} transitioned to {}", id, next.status);
                Ok(Some(next))
            }
            Err(e) if is_lock_conflict(&e) => Ok(None),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }

    async fn delete(&self, id: MemoryId) -> Result<bool> {
        let staged = self.cf(cf::STAGED)?;
        let key = staged_key(id);

        let txn = self.db.transaction_opt(&self.write_opts(), &self.txn_opts());
        let existing = match txn.get_for_update_cf(staged, &key, true) {
            Ok(v) => v,
            Err(e) if is_lock_conflict(&e) => return Ok(false),
            Err(e) => return Err(Error::Storage(e.to_string())),
        };
        if existing.is_none() {
            return Ok(false);
        }

        txn.delete_cf(staged, &key)
            .map_err(|e| Error::Storage(e.to_string()))?;
        match txn.commit() {
            Ok(()) => {
                debug!("Deleted staged record {}", id);
                Ok(true)
            }
            Err(e) if is_lock_conflict(&e) => Ok(false),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }

    async fn aggregate(&self) -> Result<StagingAggregate> {
        let pending = self.scan(|r| r.status == StagedStatus::Pending)?;

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
        // The transactional engine exposes no explicit memtable flush;
        // durability is governed per commit through the sync write options.
        debug!(
            "Staging store flush requested (sync_writes={})",
            self.options.sync_writes
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.flush().await?;
        info!("Staging store closed");
        Ok(())
    }
}
