//! Wire types for the gateway endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use toolgate_core::{Decision, ExecutionResult, PendingApproval};

/// Inbound execution request.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    /// Who is asking.
    pub tenant_id: String,
    /// Which tool to run.
    pub tool: String,
    /// Structured tool arguments.
    #[serde(default)]
    pub arguments: Value,
    /// Caller-supplied request id; generated when omitted. Resubmitting
    /// the same id maps to the same approval record.
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Outcome of an execution request.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunResponse {
    /// The invocation ran synchronously (HTTP 200).
    Completed {
        request_id: String,
        result: ExecutionResult,
    },
    /// The invocation was suspended for approval (HTTP 202).
    AwaitingApproval {
        request_id: String,
        approval_id: String,
    },
}

/// An approver's decision on a suspended invocation.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub outcome: Decision,
    pub decided_by: String,
}

/// Outcome of applying a decision.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DecisionResponse {
    /// Approved: the suspended invocation executed.
    Executed { result: ExecutionResult },
    /// Rejected: the record is terminal, nothing ran.
    Rejected { approval: PendingApproval },
}

/// Uniform error body with a stable machine-readable code.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub error: String,
}
