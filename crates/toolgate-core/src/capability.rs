//! Capability grants — the permission axis for sandbox execution.
//!
//! A [`CapabilityGrant`] is computed fresh for every execution from the
//! tool's declared capabilities and the requesting tenant, and is the
//! *only* source of sandbox permissions: no filesystem scope means no
//! preopened directory, an empty network allowlist means every outbound
//! destination is refused. Grants are never shared or cached across
//! tenants.

use std::net::{IpAddr, SocketAddr};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ToolDefinition;

/// Errors raised while deriving a grant from a tool definition.
#[derive(Debug, Error)]
pub enum GrantError {
    #[error("invalid tenant id {tenant_id:?}: only [A-Za-z0-9_-] is allowed")]
    InvalidTenantId { tenant_id: String },

    #[error("filesystem pattern {pattern:?} must contain the {{tenant_id}} placeholder")]
    MissingTenantPlaceholder { pattern: String },

    #[error("filesystem pattern {pattern:?} escapes the tenant subtree")]
    EscapesTenantSubtree { pattern: String },
}

/// The placeholder substituted with the concrete tenant id.
const TENANT_PLACEHOLDER: &str = "{tenant_id}";

// ---------------------------------------------------------------------------
// FilesystemScope
// ---------------------------------------------------------------------------

/// A concrete filesystem subtree the guest may address.
///
/// The root is always confined under `{scratch_root}/{tenant_id}`;
/// [`CapabilityGrant::derive`] refuses patterns that would escape it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemScope {
    /// Host path of the subtree root.
    pub root: PathBuf,
}

// ---------------------------------------------------------------------------
// NetworkAllowlist
// ---------------------------------------------------------------------------

/// Allowed outbound destinations as `host:port` patterns.
///
/// `host` may be a hostname, an IP literal, or `*`; `port` may be a
/// number or `*`. An empty allowlist denies everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NetworkAllowlist {
    entries: Vec<String>,
}

impl NetworkAllowlist {
    /// Build an allowlist from `host:port` pattern strings.
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    /// An allowlist that refuses every destination.
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Whether any destination at all is allowed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check a `host:port` destination against the patterns.
    pub fn permits(&self, host: &str, port: u16) -> bool {
        self.entries.iter().any(|entry| {
            let Some((pat_host, pat_port)) = entry.rsplit_once(':') else {
                return false;
            };
            let host_ok = pat_host == "*" || pat_host.eq_ignore_ascii_case(host);
            let port_ok = pat_port == "*" || pat_port.parse::<u16>() == Ok(port);
            host_ok && port_ok
        })
    }

    /// Check a resolved socket address. Only IP-literal and wildcard
    /// patterns can match here; hostname patterns are consulted at name
    /// lookup time by the host, before any address exists.
    pub fn permits_socket(&self, addr: SocketAddr) -> bool {
        self.entries.iter().any(|entry| {
            let Some((pat_host, pat_port)) = entry.rsplit_once(':') else {
                return false;
            };
            let host_ok = pat_host == "*"
                || pat_host
                    .parse::<IpAddr>()
                    .map(|ip| ip == addr.ip())
                    .unwrap_or(false);
            let port_ok = pat_port == "*" || pat_port.parse::<u16>() == Ok(addr.port());
            host_ok && port_ok
        })
    }
}

// ---------------------------------------------------------------------------
// CapabilityGrant
// ---------------------------------------------------------------------------

/// An explicit, per-execution permission set.
///
/// Constructed immediately before sandbox invocation and discarded
/// after; serialized into the pending-approval record when an execution
/// is suspended so that resumption uses the grant computed at
/// submission time, not a regrant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityGrant {
    /// Tenant the grant was scoped to.
    pub tenant_id: String,
    /// Filesystem subtree, if any. `None` means total filesystem denial.
    pub filesystem: Option<FilesystemScope>,
    /// Outbound network allowlist. Empty means total network denial.
    pub network: NetworkAllowlist,
    /// Hard instruction budget for the execution.
    pub fuel_ceiling: u64,
}

impl CapabilityGrant {
    /// Derive a concrete grant for one execution.
    ///
    /// Substitutes `{tenant_id}` into the tool's filesystem pattern and
    /// verifies the result stays inside `{scratch_root}/{tenant_id}`.
    /// Rejects tenant ids containing path separators or dots so the
    /// substitution itself cannot be used to escape.
    pub fn derive(
        tool: &ToolDefinition,
        tenant_id: &str,
        scratch_root: &Path,
    ) -> Result<Self, GrantError> {
        if tenant_id.is_empty()
            || !tenant_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(GrantError::InvalidTenantId {
                tenant_id: tenant_id.to_string(),
            });
        }

        let filesystem = match &tool.capabilities.filesystem {
            None => None,
            Some(pattern) => {
                if !pattern.contains(TENANT_PLACEHOLDER) {
                    return Err(GrantError::MissingTenantPlaceholder {
                        pattern: pattern.clone(),
                    });
                }
                let relative = pattern.replace(TENANT_PLACEHOLDER, tenant_id);
                let relative_path = Path::new(&relative);

                let mut components = relative_path.components();
                let first_is_tenant = matches!(
                    components.next(),
                    Some(Component::Normal(first)) if first == std::ffi::OsStr::new(tenant_id)
                );
                let rest_is_plain = components
                    .all(|c| matches!(c, Component::Normal(_)));
                if !first_is_tenant || !rest_is_plain {
                    return Err(GrantError::EscapesTenantSubtree {
                        pattern: pattern.clone(),
                    });
                }

                Some(FilesystemScope {
                    root: scratch_root.join(relative_path),
                })
            }
        };

        Ok(Self {
            tenant_id: tenant_id.to_string(),
            filesystem,
            network: NetworkAllowlist::new(tool.capabilities.network.clone()),
            fuel_ceiling: tool.capabilities.fuel,
        })
    }

    /// A grant with no capabilities beyond a fuel budget. Used for
    /// unrecognized tools, which are gated but must still carry a
    /// concrete (empty) permission snapshot.
    pub fn deny_all(tenant_id: &str, fuel_ceiling: u64) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            filesystem: None,
            network: NetworkAllowlist::deny_all(),
            fuel_ceiling,
        }
    }
}
