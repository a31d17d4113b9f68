//! Tool Broker port
//!
//! Defines the interface for invoking external tools (calculator, web
//! search, code execution). Whether a query needs a tool is decided
//! upstream; the engine only consumes the authoritative result.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during tool invocation
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),
}

/// Result of a successful tool invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Tool that produced the value
    pub tool: String,
    /// The result rendered as text
    pub value: String,
}

impl ToolOutput {
    pub fn new(tool: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            value: value.into(),
        }
    }
}

/// Port for tool invocation
#[async_trait]
pub trait ToolBroker: Send + Sync {
    /// Invoke a tool with JSON arguments
    async fn invoke(&self, tool: &str, args: &serde_json::Value) -> Result<ToolOutput, ToolError>;
}
