//! Sandbox executor: isolated, fuel-metered tool execution.
//!
//! Given a tool binary and a capability grant, runs the guest under
//! hard resource limits and returns a structured result or a classified
//! failure. Has no knowledge of approval — gating happens upstream in
//! the pipeline.
//!
//! # Modules
//!
//! - [`engine`]  — `SandboxExecutor` (wasmtime engine, per-call store/WASI)
//! - [`failure`] — `ExecutionResult` + `ExecutionFailure` taxonomy

pub mod engine;
pub mod failure;

pub use engine::{ExecutorConfig, SandboxExecutor};
pub use failure::{ExecutionFailure, ExecutionResult};
