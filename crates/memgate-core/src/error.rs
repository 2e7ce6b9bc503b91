//! Error types for MemGate
//!
//! Provides the error hierarchy for staging and temporal query operations.
//!
//! Compare-and-set precondition failures are deliberately *not* errors: the
//! staging layer reports them as `None` / `false` results, and callers
//! branch on those values. Only storage faults, malformed input, and
//! internal invariant breaks surface through this enum.

use thiserror::Error;

/// The main error type for MemGate operations
#[derive(Error, Debug)]
pub enum Error {
    // ========== Storage Errors ==========
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    // ========== Transaction Errors ==========
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    // ========== Serialization Errors ==========
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ========== Temporal Errors ==========
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    // ========== Validation Errors ==========
    #[error("Validation error: {0}")]
    Validation(String),

    // ========== IO Errors ==========
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========== Configuration Errors ==========
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for MemGate operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns true if this error is recoverable by retrying the operation
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::TransactionConflict(_) | Error::NotFound(_)
        )
    }

    /// Returns true if this error is a concurrent-transition conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::TransactionConflict(_))
    }
}
