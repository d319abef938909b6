//! Execution results and failure classification.
//!
//! Callers must be able to tell "the tool was malicious or buggy" apart
//! from "the infrastructure failed": only [`ExecutionFailure::HostError`]
//! is eligible for caller-side retry, and the core itself never retries
//! guest execution.

use serde::{Deserialize, Serialize};

/// Why an execution terminated abnormally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionFailure {
    /// The guest exhausted its fuel budget. Deterministic and
    /// guest-unbypassable; never a partial success.
    FuelExhausted,
    /// An operation was refused at the capability boundary.
    CapabilityDenied { resource: String, reason: String },
    /// The guest trapped or violated the guest ABI.
    GuestTrap { reason: String },
    /// The host infrastructure failed. The only retryable category.
    HostError { reason: String },
}

impl ExecutionFailure {
    /// Stable identifier for this failure category.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FuelExhausted => "fuel_exhausted",
            Self::CapabilityDenied { .. } => "capability_denied",
            Self::GuestTrap { .. } => "guest_trap",
            Self::HostError { .. } => "host_error",
        }
    }

    /// Whether a caller may reasonably retry the call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::HostError { .. })
    }
}

impl std::fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FuelExhausted => write!(f, "fuel exhausted"),
            Self::CapabilityDenied { resource, reason } => {
                write!(f, "capability denied ({resource}): {reason}")
            }
            Self::GuestTrap { reason } => write!(f, "guest trap: {reason}"),
            Self::HostError { reason } => write!(f, "host error: {reason}"),
        }
    }
}

/// The outcome of a single sandbox execution.
///
/// Ephemeral — consumed by the pipeline caller, never persisted by the
/// core. Fuel consumed is always reported, success or not, and never
/// exceeds the grant's ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the guest completed normally.
    pub success: bool,
    /// Guest output (present on success).
    pub output: Option<serde_json::Value>,
    /// Fuel units consumed by this execution.
    pub fuel_consumed: u64,
    /// Failure classification (present on failure).
    pub failure: Option<ExecutionFailure>,
}

impl ExecutionResult {
    /// A normal completion.
    pub fn completed(output: serde_json::Value, fuel_consumed: u64) -> Self {
        Self {
            success: true,
            output: Some(output),
            fuel_consumed,
            failure: None,
        }
    }

    /// A classified failure.
    pub fn failed(failure: ExecutionFailure, fuel_consumed: u64) -> Self {
        Self {
            success: false,
            output: None,
            fuel_consumed,
            failure: Some(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_codes_are_stable() {
        assert_eq!(ExecutionFailure::FuelExhausted.code(), "fuel_exhausted");
        assert_eq!(
            ExecutionFailure::CapabilityDenied {
                resource: "filesystem".into(),
                reason: "no grant".into()
            }
            .code(),
            "capability_denied"
        );
        assert_eq!(
            ExecutionFailure::GuestTrap {
                reason: "unreachable".into()
            }
            .code(),
            "guest_trap"
        );
        assert_eq!(
            ExecutionFailure::HostError {
                reason: "disk full".into()
            }
            .code(),
            "host_error"
        );
    }

    #[test]
    fn test_only_host_error_is_retryable() {
        assert!(!ExecutionFailure::FuelExhausted.is_retryable());
        assert!(!ExecutionFailure::GuestTrap {
            reason: "x".into()
        }
        .is_retryable());
        assert!(ExecutionFailure::HostError {
            reason: "x".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_result_constructors() {
        let ok = ExecutionResult::completed(serde_json::json!({"n": 1}), 42);
        assert!(ok.success);
        assert_eq!(ok.fuel_consumed, 42);
        assert!(ok.failure.is_none());

        let bad = ExecutionResult::failed(ExecutionFailure::FuelExhausted, 10_000);
        assert!(!bad.success);
        assert!(bad.output.is_none());
        assert_eq!(bad.failure.unwrap().code(), "fuel_exhausted");
    }

    #[test]
    fn test_failure_serde_round_trip() {
        let failures = vec![
            ExecutionFailure::FuelExhausted,
            ExecutionFailure::CapabilityDenied {
                resource: "network".into(),
                reason: "destination not allowlisted".into(),
            },
            ExecutionFailure::GuestTrap {
                reason: "wasm trap: unreachable".into(),
            },
            ExecutionFailure::HostError {
                reason: "store unavailable".into(),
            },
        ];
        let json = serde_json::to_string(&failures).unwrap();
        let back: Vec<ExecutionFailure> = serde_json::from_str(&json).unwrap();
        assert_eq!(failures, back);
    }
}
