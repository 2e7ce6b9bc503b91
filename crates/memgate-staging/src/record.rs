//! Staged memory records and the admission state machine

use chrono::{DateTime, Utc};
use memgate_core::{Error, MemoryId, Result};
use serde::{Deserialize, Serialize};

/// Review status of a staged memory
///
/// Transitions happen only through the staging store's compare-and-set
/// primitive:
///
/// ```text
///  (none) ──add──► Pending ──lock──► Processing ──unlock──► Pending
///  Pending | Processing ──approve──► Approved
///  Pending | Processing ──reject───► Rejected
///  Approved | Rejected ──delete────► (none)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagedStatus {
    /// Awaiting review, eligible for locking
    Pending,
    /// Claimed by exactly one reviewer, finalize in flight
    Processing,
    /// Terminal: accepted for indexing into the durable store
    Approved,
    /// Terminal: declined
    Rejected,
}

impl StagedStatus {
    /// Whether this status is terminal within the staging store
    pub fn is_terminal(&self) -> bool {
        matches!(self, StagedStatus::Approved | StagedStatus::Rejected)
    }

    /// String form used in logs and aggregates
    pub fn as_str(&self) -> &'static str {
        match self {
            StagedStatus::Pending => "pending",
            StagedStatus::Processing => "processing",
            StagedStatus::Approved => "approved",
            StagedStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for StagedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A memory record held in the staging store
///
/// Owned exclusively by the staging store; mutated only through admission
/// queue operations. `id` is immutable once created and `updated_at` is
/// refreshed on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedMemory {
    /// Unique identifier, externally generated
    pub id: MemoryId,

    /// Text payload
    pub content: String,

    /// Memory layer classification (opaque to this subsystem)
    pub layer: String,

    /// Category classification (opaque to this subsystem)
    pub category: String,

    /// Confidence score in [0.0, 1.0]
    pub confidence: f64,

    /// Where this memory came from
    pub source: String,

    /// Agent that produced the memory
    pub agent_id: Option<String>,

    /// Caller that submitted the memory
    pub created_by: Option<String>,

    /// Review priority, higher first (default 0)
    pub priority: i32,

    /// When the memory stops being valid; None means never.
    /// Carried through to the durable store, not interpreted here.
    pub expires_at: Option<DateTime<Utc>>,

    /// Current admission status
    pub status: StagedStatus,

    /// When the record was staged
    pub created_at: DateTime<Utc>,

    /// Refreshed on every mutation
    pub updated_at: DateTime<Utc>,

    /// When the record reached a terminal status
    pub approved_at: Option<DateTime<Utc>>,

    /// Actor that approved or rejected the record
    pub approved_by: Option<String>,
}

impl StagedMemory {
    /// Build the initial pending record from caller-supplied fields
    pub fn from_new(new: NewStagedMemory) -> Self {
        let now = Utc::now();
        Self {
            id: new.id,
            content: new.content,
            layer: new.layer,
            category: new.category,
            confidence: new.confidence,
            source: new.source,
            agent_id: new.agent_id,
            created_by: new.created_by,
            priority: new.priority,
            expires_at: new.expires_at,
            status: StagedStatus::Pending,
            created_at: now,
            updated_at: now,
            approved_at: None,
            approved_by: None,
        }
    }

    /// Caller-facing summary of this record
    pub fn summary(&self) -> StagedSummary {
        StagedSummary {
            id: self.id,
            content: self.content.clone(),
            layer: self.layer.clone(),
            category: self.category.clone(),
            confidence: self.confidence,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Fields for a new staged memory, validated at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStagedMemory {
    pub id: MemoryId,
    pub content: String,
    pub layer: String,
    pub category: String,
    pub confidence: f64,
    pub source: String,
    pub agent_id: Option<String>,
    pub created_by: Option<String>,
    pub priority: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewStagedMemory {
    /// Create a new staged memory input with required fields
    ///
    /// Confidence must lie in [0.0, 1.0]. Whether that confidence *warrants*
    /// staging is the admission policy's call, made upstream.
    pub fn new(
        id: MemoryId,
        content: &str,
        layer: &str,
        category: &str,
        confidence: f64,
        source: &str,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(Error::Validation(format!(
                "Confidence must be within [0.0, 1.0], got {}",
                confidence
            )));
        }
        Ok(Self {
            id,
            content: content.to_string(),
            layer: layer.to_string(),
            category: category.to_string(),
            confidence,
            source: source.to_string(),
            agent_id: None,
            created_by: None,
            priority: 0,
            expires_at: None,
        })
    }

    /// Builder: set the producing agent
    pub fn agent_id(mut self, agent_id: &str) -> Self {
        self.agent_id = Some(agent_id.to_string());
        self
    }

    /// Builder: set the submitting caller
    pub fn created_by(mut self, created_by: &str) -> Self {
        self.created_by = Some(created_by.to_string());
        self
    }

    /// Builder: set review priority
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: set expiry
    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Summary returned to the caller after staging a memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedSummary {
    pub id: MemoryId,
    pub content: String,
    pub layer: String,
    pub category: String,
    pub confidence: f64,
    pub status: StagedStatus,
    pub created_at: DateTime<Utc>,
}
