//! Risk tiers for veto-gate routing.

use serde::{Deserialize, Serialize};

/// Risk tier assigned to a tool invocation.
///
/// `Low` executes directly; `High` is suspended in the veto gate until a
/// human decides. There is deliberately no middle ground: an invocation
/// either needs a human or it does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    /// Executes without approval, logged only.
    Low,
    /// Requires explicit human approval before execution.
    High,
}

impl RiskTier {
    /// Whether this tier routes through the veto gate.
    pub fn requires_approval(self) -> bool {
        matches!(self, Self::High)
    }
}

impl Default for RiskTier {
    /// A descriptor that does not declare a tier is ambiguous, and
    /// ambiguity classifies High.
    fn default() -> Self {
        Self::High
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::High => write!(f, "high"),
        }
    }
}
