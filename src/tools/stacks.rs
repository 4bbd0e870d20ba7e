//! Stack tools backed by the Portainer control plane.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::{Error, Result};
use crate::mcp::handler::{error_result, get_int_arg, success_result, ToolHandler};
use crate::mcp::protocol::{Tool, ToolResult};
use crate::portainer::{ControlPlane, Stack};

/// Returned by `list_stacks` when Portainer has no stacks.
pub const NO_STACKS_FOUND: &str = "Nenhuma stack encontrada.";

/// Returned by `get_stack_file` when the stack has no file content.
pub const STACK_FILE_EMPTY: &str = "Conteúdo do arquivo não encontrado ou vazio.";

/// Render one line per stack.
pub fn format_stacks(stacks: &[Stack]) -> String {
    if stacks.is_empty() {
        return NO_STACKS_FOUND.to_string();
    }

    stacks
        .iter()
        .map(|s| format!("ID: {} | Name: {} | Status: {}", s.id, s.name, s.status_label()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Bound a collaborator call by `limit`.
async fn bounded<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or(Err(Error::Timeout {
            millis: limit.as_millis() as u64,
        }))
}

/// List stacks tool.
pub struct ListStacksTool {
    client: Arc<dyn ControlPlane>,
    timeout: Duration,
}

impl ListStacksTool {
    pub fn new(client: Arc<dyn ControlPlane>, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ToolHandler for ListStacksTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "list_stacks".to_string(),
            description: "List every Portainer stack. Returns one line per stack with its ID, name and status.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    async fn execute(&self, _args: HashMap<String, Value>) -> Result<ToolResult> {
        match bounded(self.timeout, self.client.list_stacks()).await {
            Ok(stacks) => Ok(success_result(format_stacks(&stacks))),
            Err(e) => {
                warn!("list_stacks failed: {}", e);
                Ok(error_result(format!("Erro ao conectar ao Portainer: {}", e)))
            }
        }
    }
}

/// Get stack file tool.
pub struct GetStackFileTool {
    client: Arc<dyn ControlPlane>,
    timeout: Duration,
}

impl GetStackFileTool {
    pub fn new(client: Arc<dyn ControlPlane>, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ToolHandler for GetStackFileTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "get_stack_file".to_string(),
            description: "Read the docker-compose file (StackFileContent) of one stack.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "stack_id": {
                        "type": "integer",
                        "description": "Numeric stack ID, as shown by list_stacks"
                    }
                },
                "required": ["stack_id"]
            }),
        }
    }

    async fn execute(&self, args: HashMap<String, Value>) -> Result<ToolResult> {
        let stack_id = get_int_arg(&args, "stack_id")?;

        match bounded(self.timeout, self.client.get_stack_file(stack_id)).await {
            Ok(Some(content)) if !content.is_empty() => Ok(success_result(content)),
            Ok(_) => Ok(success_result(STACK_FILE_EMPTY)),
            Err(e) => {
                warn!("get_stack_file({}) failed: {}", stack_id, e);
                Ok(error_result(format!(
                    "Erro ao ler arquivo da stack {}: {}",
                    stack_id, e
                )))
            }
        }
    }
}
