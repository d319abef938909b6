//! Toolgate Core Library
//!
//! The capability-gated, human-supervised execution pipeline for
//! AI-agent tool calls:
//!
//! - [`classifier`] — pure risk classification (fail-closed)
//! - [`capability`] — per-execution capability grants (default-deny)
//! - [`executor`]   — fuel-metered WASM sandbox execution
//! - [`gate`]       — the durable veto (suspend-for-approval) state machine
//! - [`pipeline`]   — the coordinator composing the above
//!
//! Tool definitions arrive from external configuration, approvals are
//! persisted through `toolgate-state`, and everything needed to resume a
//! suspended execution lives in the durable record — the coordinator
//! itself is stateless and re-derivable after a crash.

pub mod capability;
pub mod classifier;
pub mod domain;
pub mod executor;
pub mod gate;
pub mod pipeline;
pub mod telemetry;

pub use capability::{CapabilityGrant, FilesystemScope, GrantError, NetworkAllowlist};
pub use classifier::{classify, PolicyRule, RiskTier, TenantPolicy};
pub use domain::{ExecutionRequest, RequestId, ToolCapabilities, ToolCatalog, ToolDefinition};
pub use executor::{ExecutionFailure, ExecutionResult, ExecutorConfig, SandboxExecutor};
pub use gate::{Decision, GateError, VetoGate};
pub use pipeline::{
    DecisionOutcome, ExecutionPipeline, PipelineError, PipelineOutcome,
};

pub use toolgate_state::{ApprovalId, ApprovalStatus, PendingApproval, VetoStore};

pub use telemetry::init_tracing;

/// Toolgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
