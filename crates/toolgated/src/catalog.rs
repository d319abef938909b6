//! Tool catalog and tenant policy loading.
//!
//! The catalog file is a JSON array of tool definitions; the policy
//! file maps tenant ids to rule lists. Both are read once at startup —
//! the core treats them as immutable for the process lifetime.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use toolgate_core::{TenantPolicy, ToolCatalog, ToolDefinition};

/// Load the tool catalog from a JSON file.
///
/// Missing binaries are a warning, not an error: a tool can be
/// registered ahead of its binary being deployed, and execution of it
/// will fail as a host error until the binary appears.
pub async fn load_catalog(path: &Path) -> Result<ToolCatalog> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read tool catalog at {}", path.display()))?;

    let definitions: Vec<ToolDefinition> =
        serde_json::from_str(&content).context("failed to parse tool catalog")?;

    for tool in &definitions {
        if !Path::new(&tool.binary_path).exists() {
            warn!(
                tool = %tool.name,
                binary = %tool.binary_path,
                "tool registered but binary not found"
            );
        }
    }

    Ok(ToolCatalog::from_definitions(definitions))
}

/// Load per-tenant risk policies, if a policy file was configured.
pub async fn load_policies(path: Option<&Path>) -> Result<HashMap<String, TenantPolicy>> {
    let Some(path) = path else {
        return Ok(HashMap::new());
    };

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read policy file at {}", path.display()))?;

    serde_json::from_str(&content).context("failed to parse tenant policies")
}
