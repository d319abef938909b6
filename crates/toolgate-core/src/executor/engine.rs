//! The sandbox engine — fuel-metered WASM execution under a capability
//! grant.
//!
//! One wasmtime [`Engine`] persists across calls; everything else — the
//! store, the WASI context, the fuel balance — is constructed fresh per
//! execution and exclusively owned by it. The guest ABI is fixed: the
//! module exports a linear `memory`, `allocate(len: u32) -> ptr: u32`,
//! and `run(ptr: u32, len: u32) -> u64` returning the output location
//! packed as `ptr << 32 | len`. Input and output are UTF-8 JSON.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};
use wasmtime::{Config, Engine, Linker, Module, Store, Trap};
use wasmtime_wasi::preview1::{self, WasiP1Ctx};
use wasmtime_wasi::{DirPerms, FilePerms, SocketAddrUse, WasiCtxBuilder};

use super::failure::{ExecutionFailure, ExecutionResult};
use crate::capability::CapabilityGrant;

/// Configuration for the sandbox executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Root under which every tenant's filesystem grants must live.
    pub scratch_root: PathBuf,
    /// Wall-clock ceiling per execution. Fuel is the primary budget;
    /// this bounds guests that suspend in host calls without burning
    /// fuel (e.g. long poll timeouts).
    pub wall_clock: Duration,
    /// How often the guest yields to the scheduler, in fuel units.
    pub fuel_yield_interval: u64,
}

impl ExecutorConfig {
    /// Defaults rooted at the given scratch directory.
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
            wall_clock: Duration::from_secs(30),
            fuel_yield_interval: 10_000,
        }
    }
}

/// Executes tool binaries inside a capability-confined WASM sandbox.
pub struct SandboxExecutor {
    engine: Engine,
    config: ExecutorConfig,
}

impl SandboxExecutor {
    /// Build the executor. The engine enables fuel metering — the sole
    /// defense against runaway guest computation — and async support so
    /// executions multiplex onto the tokio runtime.
    pub fn new(config: ExecutorConfig) -> anyhow::Result<Self> {
        let mut wasm_config = Config::new();
        wasm_config.async_support(true);
        wasm_config.consume_fuel(true);

        let engine = Engine::new(&wasm_config)?;
        Ok(Self { engine, config })
    }

    /// Root under which tenant filesystem grants are confined.
    pub fn scratch_root(&self) -> &Path {
        &self.config.scratch_root
    }

    /// Run a tool binary under the given grant. A single attempt, no
    /// internal retry; every abnormal termination is classified, and
    /// fuel consumed is reported in all cases.
    pub async fn execute(
        &self,
        binary_path: &Path,
        grant: &CapabilityGrant,
        arguments: &serde_json::Value,
    ) -> ExecutionResult {
        if let Err(failure) = self.check_confinement(grant) {
            return ExecutionResult::failed(failure, 0);
        }

        let bytes = match tokio::fs::read(binary_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return ExecutionResult::failed(
                    ExecutionFailure::HostError {
                        reason: format!(
                            "failed to read tool binary {}: {e}",
                            binary_path.display()
                        ),
                    },
                    0,
                )
            }
        };

        let module = match Module::new(&self.engine, &bytes) {
            Ok(module) => module,
            Err(e) => {
                return ExecutionResult::failed(
                    ExecutionFailure::GuestTrap {
                        reason: format!("invalid wasm module: {e}"),
                    },
                    0,
                )
            }
        };

        let wasi = match build_wasi_ctx(grant).await {
            Ok(wasi) => wasi,
            Err(failure) => return ExecutionResult::failed(failure, 0),
        };

        let mut store = Store::new(&self.engine, wasi);
        if let Err(e) = store.set_fuel(grant.fuel_ceiling) {
            return ExecutionResult::failed(
                ExecutionFailure::HostError {
                    reason: format!("failed to charge fuel: {e}"),
                },
                0,
            );
        }
        if let Err(e) = store.fuel_async_yield_interval(Some(self.config.fuel_yield_interval)) {
            return ExecutionResult::failed(
                ExecutionFailure::HostError {
                    reason: format!("failed to set yield interval: {e}"),
                },
                0,
            );
        }

        let input = arguments.to_string();
        let outcome = match tokio::time::timeout(
            self.config.wall_clock,
            self.call_guest(&mut store, &module, &input),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(ExecutionFailure::GuestTrap {
                reason: format!(
                    "wall-clock ceiling of {}ms exceeded",
                    self.config.wall_clock.as_millis()
                ),
            }),
        };

        let remaining = store.get_fuel().unwrap_or(0);
        let fuel_consumed = grant.fuel_ceiling.saturating_sub(remaining);

        match outcome {
            Ok(raw) => {
                debug!(fuel_consumed, "guest completed");
                // Tools emit JSON; a bare string payload is tolerated.
                let output = serde_json::from_str(&raw)
                    .unwrap_or_else(|_| serde_json::Value::String(raw));
                ExecutionResult::completed(output, fuel_consumed)
            }
            Err(failure) => {
                warn!(code = failure.code(), %failure, fuel_consumed, "guest failed");
                ExecutionResult::failed(failure, fuel_consumed)
            }
        }
    }

    /// Drive the guest through the fixed ABI.
    async fn call_guest(
        &self,
        store: &mut Store<WasiP1Ctx>,
        module: &Module,
        input: &str,
    ) -> Result<String, ExecutionFailure> {
        let mut linker: Linker<WasiP1Ctx> = Linker::new(&self.engine);
        preview1::add_to_linker_async(&mut linker, |ctx| ctx).map_err(|e| {
            ExecutionFailure::HostError {
                reason: format!("failed to link WASI: {e}"),
            }
        })?;

        let instance = linker
            .instantiate_async(&mut *store, module)
            .await
            .map_err(classify_wasm_error)?;

        let memory = instance.get_memory(&mut *store, "memory").ok_or_else(|| {
            ExecutionFailure::GuestTrap {
                reason: "module does not export a linear memory".into(),
            }
        })?;
        let allocate = instance
            .get_typed_func::<u32, u32>(&mut *store, "allocate")
            .map_err(|e| ExecutionFailure::GuestTrap {
                reason: format!("missing 'allocate' export: {e}"),
            })?;
        let run = instance
            .get_typed_func::<(u32, u32), u64>(&mut *store, "run")
            .map_err(|e| ExecutionFailure::GuestTrap {
                reason: format!("missing 'run' export: {e}"),
            })?;

        let input_len =
            u32::try_from(input.len()).map_err(|_| ExecutionFailure::HostError {
                reason: "input exceeds the 32-bit guest address space".into(),
            })?;

        let input_ptr = allocate
            .call_async(&mut *store, input_len)
            .await
            .map_err(classify_wasm_error)?;
        memory
            .write(&mut *store, input_ptr as usize, input.as_bytes())
            .map_err(|e| ExecutionFailure::GuestTrap {
                reason: format!("allocate returned an out-of-bounds pointer: {e}"),
            })?;

        let packed = run
            .call_async(&mut *store, (input_ptr, input_len))
            .await
            .map_err(classify_wasm_error)?;

        let output_ptr = (packed >> 32) as usize;
        let output_len = (packed & 0xffff_ffff) as usize;
        let mut output = vec![0u8; output_len];
        memory
            .read(&*store, output_ptr, &mut output)
            .map_err(|e| ExecutionFailure::GuestTrap {
                reason: format!("run returned an out-of-bounds result: {e}"),
            })?;

        String::from_utf8(output).map_err(|_| ExecutionFailure::GuestTrap {
            reason: "guest output is not valid UTF-8".into(),
        })
    }

    /// A grant snapshot may predate this process; re-verify confinement
    /// before handing it a preopen.
    fn check_confinement(&self, grant: &CapabilityGrant) -> Result<(), ExecutionFailure> {
        if let Some(scope) = &grant.filesystem {
            let tenant_root = self.config.scratch_root.join(&grant.tenant_id);
            if !scope.root.starts_with(&tenant_root) {
                return Err(ExecutionFailure::CapabilityDenied {
                    resource: "filesystem".into(),
                    reason: format!(
                        "grant root {} is outside the tenant subtree {}",
                        scope.root.display(),
                        tenant_root.display()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Build the per-call WASI context from the grant. Capabilities are
/// strictly additive over an empty context: no filesystem scope means no
/// preopens at all, no allowlist entries means sockets stay disabled.
async fn build_wasi_ctx(grant: &CapabilityGrant) -> Result<WasiP1Ctx, ExecutionFailure> {
    let mut builder = WasiCtxBuilder::new();

    if let Some(scope) = &grant.filesystem {
        tokio::fs::create_dir_all(&scope.root)
            .await
            .map_err(|e| ExecutionFailure::HostError {
                reason: format!(
                    "failed to prepare scratch subtree {}: {e}",
                    scope.root.display()
                ),
            })?;
        builder
            .preopened_dir(&scope.root, "/", DirPerms::all(), FilePerms::all())
            .map_err(|e| ExecutionFailure::HostError {
                reason: format!("failed to preopen {}: {e}", scope.root.display()),
            })?;
    }

    if !grant.network.is_empty() {
        let allowlist = grant.network.clone();
        builder.inherit_network();
        builder.allow_ip_name_lookup(true);
        builder.socket_addr_check(move |addr: SocketAddr, _use: SocketAddrUse| {
            let allowlist = allowlist.clone();
            Box::pin(async move { allowlist.permits_socket(addr) })
        });
    }

    Ok(builder.build_p1())
}

/// Map a wasmtime error onto the failure taxonomy. Out-of-fuel traps
/// are surfaced as their own category; everything else the guest did is
/// a guest trap.
fn classify_wasm_error(e: wasmtime::Error) -> ExecutionFailure {
    if let Some(&trap) = e.downcast_ref::<Trap>() {
        if trap == Trap::OutOfFuel {
            return ExecutionFailure::FuelExhausted;
        }
        return ExecutionFailure::GuestTrap {
            reason: trap.to_string(),
        };
    }
    ExecutionFailure::GuestTrap {
        reason: format!("{e:#}"),
    }
}
