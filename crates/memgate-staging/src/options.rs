//! Staging store configuration options

use std::path::PathBuf;

/// Options for configuring the RocksDB-backed staging store
#[derive(Debug, Clone)]
pub struct StagingOptions {
    /// Path to the database directory
    pub path: PathBuf,

    /// Whether to create the database if it doesn't exist
    pub create_if_missing: bool,

    /// Maximum size of the write buffer (memtable) in bytes
    pub write_buffer_size: usize,

    /// Enable compression
    pub enable_compression: bool,

    /// Sync writes to disk immediately (slower but more durable)
    pub sync_writes: bool,

    /// How long a transition waits on a contended record lock before it is
    /// reported back as a lost race, in milliseconds
    pub lock_timeout_ms: i64,
}

impl StagingOptions {
    /// Create options for a staging store at the given path
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create options optimized for development/testing
    pub fn for_testing<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            create_if_missing: true,
            write_buffer_size: 4 * 1024 * 1024, // 4MB for tests
            enable_compression: false,
            sync_writes: false,
            lock_timeout_ms: 1000,
        }
    }

    /// Create options optimized for production
    pub fn for_production<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            create_if_missing: true,
            write_buffer_size: 64 * 1024 * 1024, // 64MB
            enable_compression: true,
            sync_writes: true,
            lock_timeout_ms: 5000,
        }
    }

    /// Set the write buffer size
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Enable or disable synchronous writes
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Enable or disable compression
    pub fn compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }

    /// Set the record lock timeout in milliseconds
    pub fn lock_timeout_ms(mut self, ms: i64) -> Self {
        self.lock_timeout_ms = ms;
        self
    }
}

impl Default for StagingOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/staging"),
            create_if_missing: true,
            write_buffer_size: 32 * 1024 * 1024, // 32MB
            enable_compression: true,
            sync_writes: false,
            lock_timeout_ms: 1000,
        }
    }
}
