//! Tool definitions — the external capability descriptor input.
//!
//! A [`ToolDefinition`] is loaded from configuration at startup and
//! treated as read-only for the process lifetime. The core never
//! invents capability values; whatever is absent from the descriptor is
//! denied at execution time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::classifier::RiskTier;

/// Capabilities a tool may be granted, as declared in configuration.
///
/// Every field is interpreted default-deny: `filesystem: None` means the
/// tool gets no preopened directory at all, an empty `network` list
/// means every destination is refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ToolCapabilities {
    /// Filesystem subtree pattern, relative to the scratch root. Must
    /// contain the `{tenant_id}` placeholder so concrete grants are
    /// always tenant-scoped (e.g. `"{tenant_id}/workspace"`).
    #[serde(default)]
    pub filesystem: Option<String>,
    /// Allowed outbound destinations as `host:port` patterns. `*` is a
    /// wildcard for either side.
    #[serde(default)]
    pub network: Vec<String>,
    /// Default fuel budget charged into each execution.
    #[serde(default = "ToolCapabilities::default_fuel")]
    pub fuel: u64,
}

impl ToolCapabilities {
    /// Conservative fuel budget used when configuration omits one.
    pub fn default_fuel() -> u64 {
        1_000_000
    }
}

/// Immutable descriptor of a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name, unique within the catalog.
    pub name: String,
    /// Human-readable description (surfaced to the external planner).
    pub description: String,
    /// Path to the `.wasm` module implementing the tool.
    pub binary_path: String,
    /// JSON schema for the tool's arguments. Opaque to the core.
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Declared default risk tier. Tenant policy may escalate but never
    /// lower it.
    #[serde(default)]
    pub risk_tier: RiskTier,
    /// Declared capability requirements.
    #[serde(default)]
    pub capabilities: ToolCapabilities,
}

/// The read-only tool catalog handed to the pipeline at construction.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: HashMap<String, ToolDefinition>,
}

impl ToolCatalog {
    /// Build a catalog from a list of definitions. Later duplicates of
    /// the same name replace earlier ones.
    pub fn from_definitions(definitions: Vec<ToolDefinition>) -> Self {
        let tools = definitions
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();
        Self { tools }
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Iterate over all definitions.
    pub fn iter(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.values()
    }
}
