//! Sandbox executor tests against real (WAT-compiled) guest modules.
//!
//! Covers the resource and capability properties: fuel is always
//! reported and never exceeds the ceiling, exhaustion is a hard stop,
//! and a grant with no filesystem scope leaves the guest unable to open
//! any host file descriptor.

use std::path::{Path, PathBuf};

use toolgate_core::{
    CapabilityGrant, ExecutionFailure, ExecutorConfig, FilesystemScope, NetworkAllowlist,
    SandboxExecutor,
};

/// A well-behaved guest: echoes its input back as its output.
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

/// A runaway guest: spins forever. Only fuel can stop it.
const SPIN_GUEST: &str = r#"
(module
  (memory (export "memory") 1)
  (func (export "allocate") (param i32) (result i32) (i32.const 1024))
  (func (export "run") (param i32) (param i32) (result i64)
    (loop $spin (br $spin))
    (i64.const 0))
)
"#;

/// A probing guest: attempts `path_open` on the first preopen (fd 3)
/// and returns the errno as two ASCII digits.
const FS_PROBE_GUEST: &str = r#"
(module
  (import "wasi_snapshot_preview1" "path_open"
    (func $path_open (param i32 i32 i32 i32 i32 i64 i64 i32 i32) (result i32)))
  (memory (export "memory") 1)
  (data (i32.const 512) "probe.txt")
  (func (export "allocate") (param i32) (result i32) (i32.const 2048))
  (func (export "run") (param i32) (param i32) (result i64)
    (local $errno i32)
    (local.set $errno
      (call $path_open
        (i32.const 3)       ;; fd: first preopen
        (i32.const 0)       ;; dirflags
        (i32.const 512)     ;; path ptr
        (i32.const 9)       ;; path len ("probe.txt")
        (i32.const 0)       ;; oflags
        (i64.const 2)       ;; rights base: fd_read
        (i64.const 0)       ;; rights inheriting
        (i32.const 0)       ;; fdflags
        (i32.const 1024)))  ;; opened-fd out ptr
    (i32.store8 (i32.const 1536)
      (i32.add (i32.const 48) (i32.div_u (local.get $errno) (i32.const 10))))
    (i32.store8 (i32.const 1537)
      (i32.add (i32.const 48) (i32.rem_u (local.get $errno) (i32.const 10))))
    (i64.or (i64.shl (i64.const 1536) (i64.const 32)) (i64.const 2)))
)
"#;

/// WASI preview1 errno for "bad file descriptor".
const ERRNO_BADF: &str = "08";
/// WASI preview1 errno for success.
const ERRNO_SUCCESS: &str = "00";

fn write_guest(dir: &Path, name: &str, wat_src: &str) -> PathBuf {
    let bytes = wat::parse_str(wat_src).expect("guest wat must compile");
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn executor(scratch_root: &Path) -> SandboxExecutor {
    SandboxExecutor::new(ExecutorConfig::new(scratch_root)).unwrap()
}

fn deny_all(fuel_ceiling: u64) -> CapabilityGrant {
    CapabilityGrant::deny_all("tenant-a", fuel_ceiling)
}

// ── Normal completion ──

#[tokio::test]
async fn echo_guest_round_trips_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_guest(dir.path(), "echo.wasm", ECHO_GUEST);
    let exec = executor(dir.path());

    let arguments = serde_json::json!({"input": "hello sandbox"});
    let result = exec.execute(&binary, &deny_all(1_000_000), &arguments).await;

    assert!(result.success, "failure: {:?}", result.failure);
    assert_eq!(result.output.unwrap(), arguments);
    assert!(result.fuel_consumed > 0);
    assert!(result.fuel_consumed <= 1_000_000);
}

// ── Fuel properties ──

#[tokio::test]
async fn runaway_guest_exhausts_fuel_deterministically() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_guest(dir.path(), "spin.wasm", SPIN_GUEST);
    let exec = executor(dir.path());

    let ceiling = 200_000;
    let result = exec
        .execute(&binary, &deny_all(ceiling), &serde_json::json!({}))
        .await;

    assert!(!result.success);
    assert_eq!(result.failure, Some(ExecutionFailure::FuelExhausted));
    // Never a partial success, and consumption never exceeds the ceiling.
    assert!(result.output.is_none());
    assert!(result.fuel_consumed <= ceiling);
}

#[tokio::test]
async fn fuel_exhaustion_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_guest(dir.path(), "spin.wasm", SPIN_GUEST);
    let exec = executor(dir.path());

    for _ in 0..3 {
        let result = exec
            .execute(&binary, &deny_all(50_000), &serde_json::json!({}))
            .await;
        assert_eq!(result.failure, Some(ExecutionFailure::FuelExhausted));
    }
}

#[tokio::test]
async fn fuel_is_reported_on_success_and_failure() {
    let dir = tempfile::tempdir().unwrap();
    let echo = write_guest(dir.path(), "echo.wasm", ECHO_GUEST);
    let spin = write_guest(dir.path(), "spin.wasm", SPIN_GUEST);
    let exec = executor(dir.path());

    let ok = exec.execute(&echo, &deny_all(1_000_000), &serde_json::json!({})).await;
    assert!(ok.success && ok.fuel_consumed > 0);

    let bad = exec.execute(&spin, &deny_all(50_000), &serde_json::json!({})).await;
    assert!(!bad.success && bad.fuel_consumed > 0);
}

// ── Filesystem capability ──

#[tokio::test]
async fn no_filesystem_grant_means_no_descriptors() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_guest(dir.path(), "probe.wasm", FS_PROBE_GUEST);
    let exec = executor(dir.path());

    // No filesystem scope at all: fd 3 does not exist, the open fails
    // at the descriptor table before any host path is touched.
    let result = exec
        .execute(&binary, &deny_all(1_000_000), &serde_json::json!({}))
        .await;

    assert!(result.success, "failure: {:?}", result.failure);
    assert_eq!(result.output.unwrap(), serde_json::json!(ERRNO_BADF));
}

#[tokio::test]
async fn filesystem_grant_exposes_only_the_granted_subtree() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_guest(dir.path(), "probe.wasm", FS_PROBE_GUEST);
    let exec = executor(dir.path());

    // Prepare the tenant subtree with the file the guest probes for.
    let root = dir.path().join("tenant-a").join("workspace");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("probe.txt"), b"payload").unwrap();

    let grant = CapabilityGrant {
        tenant_id: "tenant-a".into(),
        filesystem: Some(FilesystemScope { root }),
        network: NetworkAllowlist::deny_all(),
        fuel_ceiling: 1_000_000,
    };

    let result = exec.execute(&binary, &grant, &serde_json::json!({})).await;
    assert!(result.success, "failure: {:?}", result.failure);
    assert_eq!(result.output.unwrap(), serde_json::json!(ERRNO_SUCCESS));
}

// ── ABI violations ──

#[tokio::test]
async fn guest_without_exports_is_a_guest_trap() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_guest(dir.path(), "empty.wasm", "(module)");
    let exec = executor(dir.path());

    let result = exec
        .execute(&binary, &deny_all(10_000), &serde_json::json!({}))
        .await;
    assert!(!result.success);
    assert_eq!(result.failure.unwrap().code(), "guest_trap");
}
