//! MCP tool implementations.
//!
//! - `stacks` - Portainer stack tools (`list_stacks`, `get_stack_file`)

pub mod stacks;

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::mcp::handler::ToolRegistry;
use crate::portainer::ControlPlane;

/// Register all tools with the registry, in the order `tools/list` reports them.
pub fn register_all_tools(
    registry: &mut ToolRegistry,
    client: Arc<dyn ControlPlane>,
    timeout: Duration,
) -> Result<()> {
    registry.register(stacks::ListStacksTool::new(client.clone(), timeout))?;
    registry.register(stacks::GetStackFileTool::new(client, timeout))?;
    Ok(())
}
