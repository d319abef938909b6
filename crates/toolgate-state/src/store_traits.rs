//! Storage trait definition for the veto gate
//!
//! `VetoStore` is the single shared mutable resource in the execution
//! core. All mutation goes through `insert_pending`, `transition`, and
//! `expire_older_than`, each atomic at record granularity — no
//! cross-record transactions are required or provided.
//!
//! An in-memory fake is provided for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StoreError;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// ApprovalId
// ---------------------------------------------------------------------------

/// Unique identifier for a pending approval record.
///
/// Derived deterministically from the originating request id, so a
/// resubmitted request collides with its own prior record and
/// at-most-one enforcement reduces to a unique-index property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalId(pub String);

impl ApprovalId {
    /// Derive the approval id for a request id (SHA-256, hex).
    pub fn from_request(request_id: &str) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(request_id.as_bytes());
        ApprovalId(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars) for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ApprovalStatus
// ---------------------------------------------------------------------------

/// Status of a pending approval record.
///
/// Transitions are monotone: `Pending` is the only non-terminal state,
/// and each record moves to exactly one of the three terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Waiting for a decision.
    Pending,
    /// An approver authorized execution.
    Approved,
    /// An approver refused execution.
    Rejected,
    /// The TTL elapsed before any decision committed.
    Expired,
}

impl ApprovalStatus {
    /// Whether this status admits no further transition.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Stable storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PendingApproval
// ---------------------------------------------------------------------------

/// A durably suspended high-risk tool invocation.
///
/// Carries everything needed to resume the execution after a process
/// restart: the tool name, the original arguments, and a snapshot of the
/// capability grant computed at submission time. Records are never
/// deleted physically; terminal statuses preserve the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    /// Unique id, derived from the originating request id.
    pub approval_id: ApprovalId,
    /// Tenant that issued the request.
    pub tenant_id: String,
    /// Name of the gated tool.
    pub tool_name: String,
    /// Original request arguments (opaque to the store).
    pub arguments: serde_json::Value,
    /// Capability grant snapshot computed at submission time.
    pub capability_grant: serde_json::Value,
    /// Current status.
    pub status: ApprovalStatus,
    /// When the record was enqueued.
    pub created_at: DateTime<Utc>,
    /// When a terminal transition committed.
    pub decided_at: Option<DateTime<Utc>>,
    /// Identity of the approver (opaque; absent for expiry).
    pub decided_by: Option<String>,
}

// ---------------------------------------------------------------------------
// VetoStore
// ---------------------------------------------------------------------------

/// Durable store for pending approvals.
///
/// Guarantees:
/// - `insert_pending` is atomic and enforces at-most-one record per
///   approval id (`DuplicateRecord` on collision).
/// - `transition` commits only if the record is still `Pending` at the
///   moment of the update; a lost race returns `Ok(None)` with the store
///   unchanged by this call.
/// - `expire_older_than` applies the same conditional update in batch.
/// - A record that `insert_pending` acknowledged survives process crash
///   with identical contents.
#[async_trait]
pub trait VetoStore: Send + Sync {
    /// Persist a new `Pending` record. Fails with
    /// [`StoreError::DuplicateRecord`] if the id already exists.
    async fn insert_pending(&self, record: PendingApproval) -> StoreResult<()>;

    /// Retrieve a record by id. Fails with [`StoreError::RecordNotFound`]
    /// if absent.
    async fn get(&self, id: &ApprovalId) -> StoreResult<PendingApproval>;

    /// Atomically transition a record from `Pending` to the given
    /// terminal status, stamping `decided_at`/`decided_by`.
    ///
    /// Returns `Ok(Some(updated))` if this call committed the
    /// transition, `Ok(None)` if the record was no longer `Pending`
    /// (another transition won the race). `RecordNotFound` if the id
    /// does not exist at all.
    async fn transition(
        &self,
        id: &ApprovalId,
        to: ApprovalStatus,
        decided_at: DateTime<Utc>,
        decided_by: Option<String>,
    ) -> StoreResult<Option<PendingApproval>>;

    /// List all records still `Pending`, oldest first.
    async fn list_pending(&self) -> StoreResult<Vec<PendingApproval>>;

    /// Transition every `Pending` record created strictly before
    /// `cutoff` to `Expired`, stamping `decided_at = now`. Returns the
    /// records this call expired.
    async fn expire_older_than(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<PendingApproval>>;
}
