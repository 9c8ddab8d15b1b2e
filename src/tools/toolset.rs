//! Toolset - the ordered tools attached to one agent

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::Result;
use crate::error::Error;
use super::Tool;

/// Tool definition for LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Ordered, immutable-once-built collection of tools.
///
/// Order is registration order and is the order tools are offered to the model.
#[derive(Clone, Default)]
pub struct Toolset {
    tools: Vec<Arc<dyn Tool>>,
}

impl Toolset {
    /// Create an empty toolset
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Add a tool, replacing any earlier tool with the same name in place
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(idx) => self.tools[idx] = tool,
            None => self.tools.push(tool),
        }
        self
    }

    /// Get tool definitions for LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool by name
    pub async fn execute(&self, name: &str, params: Value) -> Result<String> {
        let tool = self.tools.iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| Error::Tool(format!("Unknown tool: {}", name)))?;

        tool.execute(params).await
    }

    /// Check if a tool exists
    pub fn has(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name() == name)
    }

    /// List tool names in order
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for Toolset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tool_names()).finish()
    }
}
