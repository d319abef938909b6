//! Domain types shared across the execution core.

pub mod request;
pub mod tool;

pub use request::{ExecutionRequest, RequestId};
pub use tool::{ToolCapabilities, ToolCatalog, ToolDefinition};
