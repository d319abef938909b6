//! End-to-end pipeline scenarios: direct execution for low risk,
//! suspend/decide for high risk, and recovery across a simulated
//! process restart.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};

use toolgate_core::{
    ApprovalStatus, CapabilityGrant, Decision, DecisionOutcome, ExecutionPipeline,
    ExecutionRequest, ExecutorConfig, GateError, PipelineError, PipelineOutcome, RequestId,
    RiskTier, SandboxExecutor, TenantPolicy, ToolCapabilities, ToolCatalog, ToolDefinition,
    VetoGate,
};
use toolgate_state::fakes::MemoryVetoStore;
use toolgate_state::SurrealVetoStore;

const ECHO_GUEST: &str = r#"
(module
  (memory (export "memory") 1)
  (global $head (mut i32) (i32.const 1024))
  (func (export "allocate") (param $len i32) (result i32)
    (local $ptr i32)
    (local.set $ptr (global.get $head))
    (global.set $head (i32.add (global.get $head) (local.get $len)))
    (local.get $ptr))
  (func (export "run") (param $ptr i32) (param $len i32) (result i64)
    (i64.or
      (i64.shl (i64.extend_i32_u (local.get $ptr)) (i64.const 32))
      (i64.extend_i32_u (local.get $len))))
)
"#;

fn write_echo_guest(dir: &Path) -> String {
    let bytes = wat::parse_str(ECHO_GUEST).unwrap();
    let path = dir.join("echo.wasm");
    std::fs::write(&path, bytes).unwrap();
    path.to_str().unwrap().to_string()
}

fn definition(name: &str, tier: RiskTier, binary_path: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.into(),
        description: "test tool".into(),
        binary_path: binary_path.into(),
        parameters: serde_json::Value::Null,
        risk_tier: tier,
        capabilities: ToolCapabilities::default(),
    }
}

fn request(id: &str, tenant: &str, tool: &str, arguments: serde_json::Value) -> ExecutionRequest {
    ExecutionRequest {
        request_id: RequestId(id.into()),
        tenant_id: tenant.into(),
        tool_name: tool.into(),
        arguments,
    }
}

// ── Scenario: low-risk tool executes synchronously, no record created ──

#[tokio::test]
async fn low_risk_tool_executes_directly() {
    let dir = tempfile::tempdir().unwrap();
    let echo = write_echo_guest(dir.path());

    let store = Arc::new(MemoryVetoStore::new());
    let pipeline = ExecutionPipeline::new(
        ToolCatalog::from_definitions(vec![definition("read-readme", RiskTier::Low, &echo)]),
        HashMap::new(),
        VetoGate::new(store, Duration::seconds(300)),
        SandboxExecutor::new(ExecutorConfig::new(dir.path().join("scratch"))).unwrap(),
    );

    let arguments = serde_json::json!({"file": "README.md"});
    let outcome = pipeline
        .handle(request("req-low", "t1", "read-readme", arguments.clone()), Utc::now())
        .await
        .unwrap();

    let PipelineOutcome::Completed(result) = outcome else {
        panic!("expected synchronous completion");
    };
    assert!(result.success);
    assert_eq!(result.output.unwrap(), arguments);

    // No approval record was created anywhere.
    assert!(pipeline.recover().await.unwrap().is_empty());
}

// ── Scenario: high-risk tool is suspended, reject never executes ──

#[tokio::test]
async fn high_risk_tool_rejected_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let echo = write_echo_guest(dir.path());
    let scratch = dir.path().join("scratch");

    // delete-file is declared High for this tenant by policy.
    let mut policies = HashMap::new();
    policies.insert(
        "T1".to_string(),
        TenantPolicy::empty().with_rule(toolgate_core::PolicyRule::ForceHigh {
            tool: "delete-file".into(),
            reason: "destructive for this tenant".into(),
        }),
    );

    let store = Arc::new(MemoryVetoStore::new());
    let pipeline = ExecutionPipeline::new(
        ToolCatalog::from_definitions(vec![definition("delete-file", RiskTier::Low, &echo)]),
        policies,
        VetoGate::new(store, Duration::seconds(300)),
        SandboxExecutor::new(ExecutorConfig::new(&scratch)).unwrap(),
    );

    let now = Utc::now();
    let outcome = pipeline
        .handle(
            request("req-del", "T1", "delete-file", serde_json::json!({"path": "q3.csv"})),
            now,
        )
        .await
        .unwrap();
    let PipelineOutcome::Paused { approval_id } = outcome else {
        panic!("expected suspension");
    };

    let decided = pipeline
        .apply_decision(&approval_id, Decision::Reject, "admin1", now)
        .await
        .unwrap();
    let DecisionOutcome::Rejected(record) = decided else {
        panic!("expected rejection");
    };
    assert_eq!(record.status, ApprovalStatus::Rejected);
    assert_eq!(record.decided_by.as_deref(), Some("admin1"));

    // The executor never ran: the scratch root was never even created.
    assert!(!scratch.exists());

    // Acting again on the terminal record is AlreadyDecided.
    let err = pipeline
        .apply_decision(&approval_id, Decision::Reject, "admin1", now)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Gate(GateError::AlreadyDecided { .. })
    ));
}

// ── Scenario: approve resumes with the original arguments ──

#[tokio::test]
async fn approve_executes_original_request() {
    let dir = tempfile::tempdir().unwrap();
    let echo = write_echo_guest(dir.path());

    let store = Arc::new(MemoryVetoStore::new());
    let pipeline = ExecutionPipeline::new(
        ToolCatalog::from_definitions(vec![definition("delete-file", RiskTier::High, &echo)]),
        HashMap::new(),
        VetoGate::new(store, Duration::seconds(300)),
        SandboxExecutor::new(ExecutorConfig::new(dir.path().join("scratch"))).unwrap(),
    );

    let arguments = serde_json::json!({"path": "reports/old.csv"});
    let now = Utc::now();
    let PipelineOutcome::Paused { approval_id } = pipeline
        .handle(request("req-1", "t1", "delete-file", arguments.clone()), now)
        .await
        .unwrap()
    else {
        panic!("expected suspension");
    };

    let outcome = pipeline
        .apply_decision(&approval_id, Decision::Approve, "admin2", now)
        .await
        .unwrap();
    let DecisionOutcome::Executed(result) = outcome else {
        panic!("expected execution");
    };
    assert!(result.success);
    // The echo guest proves the original arguments reached the guest.
    assert_eq!(result.output.unwrap(), arguments);
}

// ── Recovery: a suspended record survives a restart and resumes ──

#[tokio::test]
async fn suspended_record_survives_restart_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let echo = write_echo_guest(dir.path());
    let db_path = dir.path().join("db");
    let db_path = db_path.to_str().unwrap();

    let catalog = || {
        ToolCatalog::from_definitions(vec![definition("delete-file", RiskTier::High, &echo)])
    };
    let arguments = serde_json::json!({"path": "reports/old.csv", "recursive": false});
    let now = Utc::now();

    // First process: submit and stop — no decision.
    let approval_id = {
        let store = Arc::new(SurrealVetoStore::open(db_path).await.unwrap());
        let pipeline = ExecutionPipeline::new(
            catalog(),
            HashMap::new(),
            VetoGate::new(store, Duration::seconds(600)),
            SandboxExecutor::new(ExecutorConfig::new(dir.path().join("scratch"))).unwrap(),
        );
        let PipelineOutcome::Paused { approval_id } = pipeline
            .handle(request("req-r", "t1", "delete-file", arguments.clone()), now)
            .await
            .unwrap()
        else {
            panic!("expected suspension");
        };
        approval_id
    };

    // Second process: recover, then approve.
    let store = Arc::new(SurrealVetoStore::open(db_path).await.unwrap());
    let pipeline = ExecutionPipeline::new(
        catalog(),
        HashMap::new(),
        VetoGate::new(store, Duration::seconds(600)),
        SandboxExecutor::new(ExecutorConfig::new(dir.path().join("scratch"))).unwrap(),
    );

    let recovered = pipeline.recover().await.unwrap();
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].approval_id, approval_id);
    assert_eq!(recovered[0].arguments, arguments);
    assert_eq!(recovered[0].status, ApprovalStatus::Pending);
    let snapshot: CapabilityGrant =
        serde_json::from_value(recovered[0].capability_grant.clone()).unwrap();
    assert_eq!(snapshot.tenant_id, "t1");

    let outcome = pipeline
        .apply_decision(&approval_id, Decision::Approve, "admin1", now + Duration::seconds(30))
        .await
        .unwrap();
    let DecisionOutcome::Executed(result) = outcome else {
        panic!("expected execution after recovery");
    };
    assert!(result.success);
    assert_eq!(result.output.unwrap(), arguments);
}

// ── Expiry: the reaper and a late decision cannot both win ──

#[tokio::test]
async fn expired_record_refuses_late_decision() {
    let dir = tempfile::tempdir().unwrap();
    let echo = write_echo_guest(dir.path());

    let store = Arc::new(MemoryVetoStore::new());
    let pipeline = ExecutionPipeline::new(
        ToolCatalog::from_definitions(vec![definition("delete-file", RiskTier::High, &echo)]),
        HashMap::new(),
        VetoGate::new(store, Duration::seconds(60)),
        SandboxExecutor::new(ExecutorConfig::new(dir.path().join("scratch"))).unwrap(),
    );

    let now = Utc::now();
    let PipelineOutcome::Paused { approval_id } = pipeline
        .handle(
            request("req-x", "t1", "delete-file", serde_json::json!({})),
            now,
        )
        .await
        .unwrap()
    else {
        panic!("expected suspension");
    };

    let later = now + Duration::seconds(120);
    let reaped = pipeline.gate().reap_expired(later).await.unwrap();
    assert_eq!(reaped.len(), 1);

    let err = pipeline
        .apply_decision(&approval_id, Decision::Approve, "admin1", later)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Gate(GateError::AlreadyDecided {
            status: ApprovalStatus::Expired,
            ..
        })
    ));
}
