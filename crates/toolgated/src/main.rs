//! Toolgate gateway daemon.
//!
//! Wires the execution pipeline to its HTTP entry points:
//!
//! - `POST /v1/execute` — inbound tool-call requests (200 on synchronous
//!   completion, 202 when suspended for approval)
//! - `POST /v1/approvals/{id}/decision` — the approval entry
//! - `GET /v1/approvals` — pending approvals, for the admin surface
//! - `GET /health` — liveness probe
//!
//! The daemon owns process wiring only: catalog and policy loading,
//! store connection, startup recovery, the periodic expiry reaper, and
//! the bounded worker pool. All decision logic lives in toolgate-core.

mod api;
mod catalog;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};

use toolgate_core::{
    init_tracing, ApprovalId, DecisionOutcome, ExecutionPipeline, ExecutionRequest,
    ExecutorConfig, GateError, PipelineError, PipelineOutcome, RequestId, SandboxExecutor,
    VetoGate,
};
use toolgate_state::SurrealVetoStore;

use crate::api::{DecisionRequest, DecisionResponse, ErrorBody, RunRequest, RunResponse};

#[derive(Parser)]
#[command(name = "toolgated")]
#[command(version = toolgate_core::VERSION)]
#[command(about = "Toolgate gateway daemon", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// Path to the tool catalog (JSON array of tool definitions)
    #[arg(long, default_value = "tools.json")]
    catalog: PathBuf,

    /// Path to per-tenant risk policies (JSON object)
    #[arg(long)]
    policies: Option<PathBuf>,

    /// On-disk veto store location (TOOLGATE_DB_URL overrides)
    #[arg(long)]
    db: Option<String>,

    /// Root directory for tenant scratch subtrees
    #[arg(long, default_value = ".toolgate/scratch")]
    scratch_root: PathBuf,

    /// TTL for pending approvals, in seconds
    #[arg(long, default_value_t = 3600)]
    approval_ttl_secs: u64,

    /// Expiry reaper interval, in seconds
    #[arg(long, default_value_t = 60)]
    reap_interval_secs: u64,

    /// Maximum concurrently executing guests
    #[arg(long, default_value_t = 8)]
    max_concurrency: usize,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone)]
struct AppState {
    pipeline: Arc<ExecutionPipeline<SurrealVetoStore>>,
    permits: Arc<Semaphore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(args.json, level);

    info!("toolgated {} initializing", toolgate_core::VERSION);

    let tools = catalog::load_catalog(&args.catalog).await?;
    info!("loaded {} tools from {}", tools.len(), args.catalog.display());

    let policies = catalog::load_policies(args.policies.as_deref()).await?;
    if !policies.is_empty() {
        info!("loaded risk policies for {} tenants", policies.len());
    }

    let store = match &args.db {
        Some(path) => SurrealVetoStore::open(path).await?,
        None => SurrealVetoStore::from_env().await?,
    };

    let gate = VetoGate::new(
        Arc::new(store),
        chrono::Duration::seconds(args.approval_ttl_secs as i64),
    );
    let executor = SandboxExecutor::new(ExecutorConfig::new(&args.scratch_root))
        .context("failed to initialize the sandbox executor")?;

    let pipeline = Arc::new(ExecutionPipeline::new(tools, policies, gate, executor));

    // Startup recovery: surface suspended records, expire the overdue
    // ones immediately based on their stored timestamps.
    let pending = pipeline.recover().await?;
    info!("recovered {} pending approvals", pending.len());
    let reaped = pipeline.gate().reap_expired(Utc::now()).await?;
    if !reaped.is_empty() {
        info!("expired {} overdue approvals at startup", reaped.len());
    }

    spawn_reaper(pipeline.clone(), args.reap_interval_secs);

    let state = AppState {
        pipeline,
        permits: Arc::new(Semaphore::new(args.max_concurrency)),
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/v1/execute", post(submit_run))
        .route("/v1/approvals", get(list_pending))
        .route("/v1/approvals/:id", get(show_approval))
        .route("/v1/approvals/:id/decision", post(decide))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!("gateway listening on {}", args.listen);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically expire overdue pending approvals.
fn spawn_reaper(pipeline: Arc<ExecutionPipeline<SurrealVetoStore>>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            ticker.tick().await;
            match pipeline.gate().reap_expired(Utc::now()).await {
                Ok(reaped) if !reaped.is_empty() => {
                    info!("reaper expired {} pending approvals", reaped.len());
                }
                Ok(_) => {}
                Err(e) => warn!("reaper pass failed: {e}"),
            }
        }
    });
}

// --- HANDLERS ---

async fn health_check() -> &'static str {
    "toolgate gateway: operational"
}

async fn submit_run(
    State(state): State<AppState>,
    Json(payload): Json<RunRequest>,
) -> Response {
    let request = ExecutionRequest {
        request_id: payload
            .request_id
            .map(RequestId)
            .unwrap_or_default(),
        tenant_id: payload.tenant_id,
        tool_name: payload.tool,
        arguments: payload.arguments,
    };
    let request_id = request.request_id.0.clone();
    info!(%request_id, tool = %request.tool_name, tenant = %request.tenant_id, "execution requested");

    // One permit per executing guest; suspension returns promptly, so a
    // paused invocation does not hold a worker while a human deliberates.
    let permit = state.permits.clone().acquire_owned().await;
    if permit.is_err() {
        return error_body(StatusCode::SERVICE_UNAVAILABLE, "worker_pool", "worker pool closed");
    }

    match state.pipeline.handle(request, Utc::now()).await {
        Ok(PipelineOutcome::Completed(result)) => {
            (StatusCode::OK, Json(RunResponse::Completed { request_id, result })).into_response()
        }
        Ok(PipelineOutcome::Paused { approval_id }) => (
            StatusCode::ACCEPTED,
            Json(RunResponse::AwaitingApproval {
                request_id,
                approval_id: approval_id.as_str().to_string(),
            }),
        )
            .into_response(),
        Err(e) => pipeline_error(e),
    }
}

async fn decide(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<DecisionRequest>,
) -> Response {
    let approval_id = ApprovalId(id);
    info!(
        approval_id = %approval_id.short(),
        outcome = ?payload.outcome,
        decided_by = %payload.decided_by,
        "decision received"
    );

    // Approval may resume execution, which needs a worker slot.
    let permit = state.permits.clone().acquire_owned().await;
    if permit.is_err() {
        return error_body(StatusCode::SERVICE_UNAVAILABLE, "worker_pool", "worker pool closed");
    }

    match state
        .pipeline
        .apply_decision(&approval_id, payload.outcome, &payload.decided_by, Utc::now())
        .await
    {
        Ok(DecisionOutcome::Executed(result)) => {
            (StatusCode::OK, Json(DecisionResponse::Executed { result })).into_response()
        }
        Ok(DecisionOutcome::Rejected(approval)) => {
            (StatusCode::OK, Json(DecisionResponse::Rejected { approval })).into_response()
        }
        Err(e) => pipeline_error(e),
    }
}

async fn show_approval(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.pipeline.gate().get(&ApprovalId(id)).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => pipeline_error(PipelineError::Gate(e)),
    }
}

async fn list_pending(State(state): State<AppState>) -> Response {
    match state.pipeline.recover().await {
        Ok(pending) => (StatusCode::OK, Json(pending)).into_response(),
        Err(e) => pipeline_error(e),
    }
}

/// Map pipeline failures onto distinct, stable HTTP outcomes so the
/// orchestrator and admin surfaces can react differently per category.
fn pipeline_error(err: PipelineError) -> Response {
    match &err {
        PipelineError::Gate(gate_err) => match gate_err {
            GateError::DuplicateRequest { .. } => {
                error_body(StatusCode::CONFLICT, "duplicate_request", &err.to_string())
            }
            GateError::NotFound { .. } => {
                error_body(StatusCode::NOT_FOUND, "not_found", &err.to_string())
            }
            GateError::AlreadyDecided { .. } => {
                error_body(StatusCode::CONFLICT, "already_decided", &err.to_string())
            }
            GateError::Expired { .. } => {
                error_body(StatusCode::GONE, "expired", &err.to_string())
            }
            GateError::Store(_) => {
                error!("store failure: {err}");
                error_body(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", &err.to_string())
            }
        },
        PipelineError::Grant(_) => {
            error_body(StatusCode::BAD_REQUEST, "invalid_grant", &err.to_string())
        }
        PipelineError::GrantSnapshot(_) => {
            error!("unreadable grant snapshot: {err}");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "grant_snapshot", &err.to_string())
        }
    }
}

fn error_body(status: StatusCode, code: &'static str, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            code,
            error: message.to_string(),
        }),
    )
        .into_response()
}
