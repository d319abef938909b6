//! Classification engine — fail-closed, first-match-wins.

use tracing::debug;

use super::policy::TenantPolicy;
use super::tier::RiskTier;
use crate::domain::ToolDefinition;

/// Classify one tool invocation.
///
/// Pure and total: no I/O, no panics. An unrecognized tool (`None`) is
/// High. Otherwise the first matching tenant-policy rule escalates to
/// High; with no match, the tool's declared tier applies unchanged.
pub fn classify(
    tool: Option<&ToolDefinition>,
    arguments: &serde_json::Value,
    policy: &TenantPolicy,
) -> RiskTier {
    let Some(tool) = tool else {
        return RiskTier::High;
    };

    if let Some(rule) = policy.first_match(&tool.name, arguments) {
        debug!(tool = %tool.name, reason = rule.reason(), "policy escalated invocation to high");
        return RiskTier::High;
    }

    tool.risk_tier
}
