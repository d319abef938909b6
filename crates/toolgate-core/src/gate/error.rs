//! Error types for the veto gate.

use toolgate_state::{ApprovalStatus, StoreError};

/// Errors produced by the veto gate.
///
/// All variants except `Store` are distinct, non-retryable outcomes; a
/// `Store` failure means the durable write did not commit and the
/// caller may retry the gate call itself.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("a record for request {request_id} already exists")]
    DuplicateRequest { request_id: String },

    #[error("no approval record found for {approval_id}")]
    NotFound { approval_id: String },

    #[error("approval {approval_id} was already decided ({status})")]
    AlreadyDecided {
        approval_id: String,
        status: ApprovalStatus,
    },

    #[error("approval {approval_id} expired before a decision committed")]
    Expired { approval_id: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for gate operations.
pub type GateResult<T> = std::result::Result<T, GateError>;
