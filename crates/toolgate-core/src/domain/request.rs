//! Execution requests — the inbound unit of work.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an execution request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new random request id.
    pub fn new() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request to execute a tool on behalf of a tenant.
///
/// Immutable once created; the same request id resubmitted maps to the
/// same approval record, which is how at-most-one gating is enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Unique id for this request.
    pub request_id: RequestId,
    /// Tenant on whose behalf the tool runs.
    pub tenant_id: String,
    /// Name of the tool to invoke.
    pub tool_name: String,
    /// Structured arguments forwarded to the guest.
    pub arguments: serde_json::Value,
}

impl ExecutionRequest {
    /// Create a request with a fresh random id.
    pub fn new(
        tenant_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            request_id: RequestId::new(),
            tenant_id: tenant_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}
