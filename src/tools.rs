//! Tool implementations
//!
//! The registry is an immutable mapping from tool name to implementation,
//! built once at startup and handed to the agent loop. Tool failures are
//! surfaced as errors for the loop to render into tool-result messages;
//! the registry itself never retries and never aborts anything.

mod web;

pub use web::{FetchUrlTool, WebSearchTool};

use crate::llm::ToolSpec;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    NotFound { name: String },
    #[error("Tool {name} failed: {message}")]
    Execution { name: String, message: String },
}

/// Result from tool execution
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
        }
    }
}

/// Trait for tools the agent can invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Tool description for the model
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    /// Execute the tool
    async fn run(&self, input: Value) -> ToolOutput;
}

/// Immutable collection of the tools available to every thread
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Standard registry with the built-in web tools
    pub fn builtin() -> Self {
        let client = web::http_client();
        Self::with_tools(vec![
            Arc::new(WebSearchTool::new(client.clone())),
            Arc::new(FetchUrlTool::new(client)),
        ])
    }

    pub fn with_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// Tool declarations to expose to the model
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Invoke a tool by name, exactly once per requested call.
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ToolError::NotFound {
                name: name.to_string(),
            })?;

        let result = tool.run(arguments).await;
        if result.success {
            Ok(result.output)
        } else {
            Err(ToolError::Execution {
                name: name.to_string(),
                message: result.output,
            })
        }
    }
}
