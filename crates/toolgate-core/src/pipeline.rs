//! The execution pipeline — the coordinator composing classifier, gate,
//! and executor.
//!
//! State machine over a single request:
//! `Received → Classified → {Executing | AwaitingApproval} → Completed | Failed`.
//! Low-risk invocations go straight to the executor; high-risk ones are
//! handed to the veto gate, which persists them and returns a paused
//! outcome immediately — a true external suspension, not a blocked call.
//!
//! The coordinator is stateless and re-derivable: resumption
//! reconstructs the request and capability grant from the persisted
//! record, never from memory, so it is safe even if the process
//! restarted between suspension and resumption. Cancellation before
//! suspension is dropping the request future; after suspension it is a
//! `Reject` decision.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use toolgate_state::{ApprovalId, PendingApproval, VetoStore};

use crate::capability::{CapabilityGrant, GrantError};
use crate::classifier::{classify, TenantPolicy};
use crate::domain::{ExecutionRequest, ToolCapabilities, ToolCatalog};
use crate::executor::{ExecutionFailure, ExecutionResult, SandboxExecutor};
use crate::gate::{Decision, GateError, VetoGate};

/// Errors surfaced by the pipeline itself.
///
/// Guest failures are not errors here — they arrive classified inside
/// [`ExecutionResult`]. These are the coordinator's own failures:
/// gate/store outcomes and invalid inputs.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Grant(#[from] GrantError),

    #[error("persisted grant snapshot is unreadable: {0}")]
    GrantSnapshot(String),
}

/// Outcome of handling an inbound request.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The invocation executed synchronously.
    Completed(ExecutionResult),
    /// The invocation was suspended for approval.
    Paused { approval_id: ApprovalId },
}

/// Outcome of applying an approver's decision.
#[derive(Debug)]
pub enum DecisionOutcome {
    /// The decision was `Approve`; the suspended invocation executed.
    Executed(ExecutionResult),
    /// The decision was `Reject`; the record is terminal and nothing ran.
    Rejected(PendingApproval),
}

/// Coordinator over classifier, veto gate, and sandbox executor.
pub struct ExecutionPipeline<S: VetoStore> {
    catalog: ToolCatalog,
    policies: HashMap<String, TenantPolicy>,
    gate: VetoGate<S>,
    executor: SandboxExecutor,
    default_policy: TenantPolicy,
}

impl<S: VetoStore> ExecutionPipeline<S> {
    /// Assemble a pipeline. `policies` maps tenant ids to their risk
    /// policies; tenants without an entry get an empty policy (declared
    /// tiers apply unchanged).
    pub fn new(
        catalog: ToolCatalog,
        policies: HashMap<String, TenantPolicy>,
        gate: VetoGate<S>,
        executor: SandboxExecutor,
    ) -> Self {
        Self {
            catalog,
            policies,
            gate,
            executor,
            default_policy: TenantPolicy::empty(),
        }
    }

    /// The gate, for callers that need direct record access.
    pub fn gate(&self) -> &VetoGate<S> {
        &self.gate
    }

    /// Handle one inbound request: classify, then execute or suspend.
    pub async fn handle(
        &self,
        request: ExecutionRequest,
        now: DateTime<Utc>,
    ) -> Result<PipelineOutcome, PipelineError> {
        let tool = self.catalog.get(&request.tool_name);
        let policy = self
            .policies
            .get(&request.tenant_id)
            .unwrap_or(&self.default_policy);

        let tier = classify(tool, &request.arguments, policy);
        info!(
            request_id = %request.request_id,
            tenant_id = %request.tenant_id,
            tool = %request.tool_name,
            %tier,
            "classified invocation"
        );

        // The grant is computed fresh per execution, before gating, so
        // the suspended record carries the exact permission snapshot the
        // eventual execution will run under.
        let grant = match tool {
            Some(tool) => CapabilityGrant::derive(
                tool,
                &request.tenant_id,
                self.executor.scratch_root(),
            )?,
            None => {
                CapabilityGrant::deny_all(&request.tenant_id, ToolCapabilities::default_fuel())
            }
        };

        // Unknown tools classify High, so a Low tier implies the lookup
        // succeeded; anything else is suspended, fail-closed.
        match (tier.requires_approval(), tool) {
            (false, Some(tool)) => {
                let result = self
                    .executor
                    .execute(Path::new(&tool.binary_path), &grant, &request.arguments)
                    .await;
                Ok(PipelineOutcome::Completed(result))
            }
            _ => {
                let record = self.gate.submit(&request, &grant, now).await?;
                Ok(PipelineOutcome::Paused {
                    approval_id: record.approval_id,
                })
            }
        }
    }

    /// Apply an approver's decision to a suspended invocation.
    ///
    /// `Approve` re-enters the pipeline at the execution step, rebuilt
    /// entirely from the persisted record; `Reject` finalizes the record
    /// without ever invoking the executor.
    pub async fn apply_decision(
        &self,
        id: &ApprovalId,
        decision: Decision,
        decided_by: &str,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, PipelineError> {
        let record = self.gate.decide(id, decision, decided_by, now).await?;
        match decision {
            Decision::Reject => Ok(DecisionOutcome::Rejected(record)),
            Decision::Approve => {
                let result = self.resume(&record).await?;
                Ok(DecisionOutcome::Executed(result))
            }
        }
    }

    /// Execute a previously approved record.
    ///
    /// Everything needed — tool name, arguments, capability grant — is
    /// reconstructed from the record, which may predate this process.
    pub async fn resume(
        &self,
        record: &PendingApproval,
    ) -> Result<ExecutionResult, PipelineError> {
        let grant: CapabilityGrant = serde_json::from_value(record.capability_grant.clone())
            .map_err(|e| PipelineError::GrantSnapshot(e.to_string()))?;

        let Some(tool) = self.catalog.get(&record.tool_name) else {
            warn!(
                tool = %record.tool_name,
                approval_id = %record.approval_id.short(),
                "approved tool is no longer registered"
            );
            return Ok(ExecutionResult::failed(
                ExecutionFailure::HostError {
                    reason: format!("tool '{}' is no longer registered", record.tool_name),
                },
                0,
            ));
        };

        Ok(self
            .executor
            .execute(Path::new(&tool.binary_path), &grant, &record.arguments)
            .await)
    }

    /// Recover all suspended invocations after a restart.
    pub async fn recover(&self) -> Result<Vec<PendingApproval>, PipelineError> {
        Ok(self.gate.recover().await?)
    }
}
