//! Tenant policy rules for risk escalation.

use serde::{Deserialize, Serialize};

/// A single policy rule matched against a tool invocation.
///
/// Rules only escalate: a matching rule forces `High`. There is no rule
/// form that lowers a declared-High tool to Low.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyRule {
    /// Force a specific tool to High for this tenant.
    ForceHigh { tool: String, reason: String },
    /// Force High when an argument matches a pattern.
    ///
    /// `pointer` is a JSON pointer into the arguments (e.g.
    /// `/path`); `pattern` is a regex matched against the string value
    /// at that location. A non-string value or a missing location does
    /// not match; an invalid regex matches unconditionally (ambiguous
    /// configuration fails closed).
    ArgumentPattern {
        tool: String,
        pointer: String,
        pattern: String,
        reason: String,
    },
}

impl PolicyRule {
    /// Returns `true` if this rule escalates the given invocation.
    pub fn matches(&self, tool_name: &str, arguments: &serde_json::Value) -> bool {
        match self {
            PolicyRule::ForceHigh { tool, .. } => tool == tool_name,
            PolicyRule::ArgumentPattern {
                tool,
                pointer,
                pattern,
                ..
            } => {
                if tool != tool_name {
                    return false;
                }
                let Some(value) = arguments.pointer(pointer).and_then(|v| v.as_str()) else {
                    return false;
                };
                match regex::Regex::new(pattern) {
                    Ok(re) => re.is_match(value),
                    // Unparseable pattern: escalate rather than guess.
                    Err(_) => true,
                }
            }
        }
    }

    /// The operator-facing reason attached to this rule.
    pub fn reason(&self) -> &str {
        match self {
            PolicyRule::ForceHigh { reason, .. } => reason,
            PolicyRule::ArgumentPattern { reason, .. } => reason,
        }
    }
}

/// Per-tenant risk policy: an ordered rule list, first match wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TenantPolicy {
    pub rules: Vec<PolicyRule>,
}

impl TenantPolicy {
    /// A policy with no overrides (declared tiers apply unchanged).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append a rule and return `self` (builder pattern).
    pub fn with_rule(mut self, rule: PolicyRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Find the first rule escalating the given invocation, if any.
    pub fn first_match(
        &self,
        tool_name: &str,
        arguments: &serde_json::Value,
    ) -> Option<&PolicyRule> {
        self.rules.iter().find(|r| r.matches(tool_name, arguments))
    }
}
