//! Agent definitions and their builder.
//!
//! An [`AgentDefinition`] is immutable once built: its tools and handoff
//! targets are fixed by [`AgentBuilder::build`].

use std::sync::Arc;

use serde_json::json;

use crate::error::Error;
use crate::tools::{Tool, ToolDefinition, Toolset};
use crate::Result;

const TRANSFER_PREFIX: &str = "transfer_to_";

/// A named agent configuration.
#[derive(Debug)]
pub struct AgentDefinition {
    name: String,
    handoff_description: Option<String>,
    instructions: String,
    model: Option<String>,
    tools: Toolset,
    handoffs: Vec<Arc<AgentDefinition>>,
}

impl AgentDefinition {
    /// Start building an agent.
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Short description other agents see when deciding to hand off here.
    pub fn handoff_description(&self) -> Option<&str> {
        self.handoff_description.as_deref()
    }

    /// Model override; `None` uses the run configuration's model.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn tools(&self) -> &Toolset {
        &self.tools
    }

    pub fn handoffs(&self) -> &[Arc<AgentDefinition>] {
        &self.handoffs
    }

    /// Name of the synthetic tool that transfers control to this agent.
    pub fn transfer_tool_name(&self) -> String {
        let slug: String = self
            .name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{TRANSFER_PREFIX}{slug}")
    }

    /// Handoff target reached through the given tool name, if any.
    pub fn find_handoff(&self, tool_name: &str) -> Option<&Arc<AgentDefinition>> {
        if !tool_name.starts_with(TRANSFER_PREFIX) {
            return None;
        }
        self.handoffs.iter().find(|a| a.transfer_tool_name() == tool_name)
    }

    /// Every tool offered to the model: own tools first, then transfers.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs = self.tools.definitions();
        defs.extend(self.handoffs.iter().map(|target| ToolDefinition {
            name: target.transfer_tool_name(),
            description: format!(
                "Handoff to the {} agent to handle the request. {}",
                target.name,
                target.handoff_description.as_deref().unwrap_or_default()
            )
            .trim_end()
            .to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }));
        defs
    }

    /// System prompt sent at the head of every model call for this agent.
    pub fn system_prompt(&self) -> String {
        if self.handoffs.is_empty() {
            return self.instructions.clone();
        }

        let targets: Vec<String> = self
            .handoffs
            .iter()
            .map(|t| match &t.handoff_description {
                Some(desc) => format!("- {} (`{}`): {}", t.name, t.transfer_tool_name(), desc),
                None => format!("- {} (`{}`)", t.name, t.transfer_tool_name()),
            })
            .collect();

        format!(
            "{}\n\n## Handoffs\nYou can transfer the conversation to one of these agents by calling its transfer tool:\n{}",
            self.instructions,
            targets.join("\n")
        )
    }
}

/// Builder for [`AgentDefinition`].
pub struct AgentBuilder {
    name: String,
    handoff_description: Option<String>,
    instructions: String,
    model: Option<String>,
    tools: Toolset,
    handoffs: Vec<Arc<AgentDefinition>>,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handoff_description: None,
            instructions: String::new(),
            model: None,
            tools: Toolset::new(),
            handoffs: Vec::new(),
        }
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn handoff_description(mut self, description: impl Into<String>) -> Self {
        self.handoff_description = Some(description.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools = self.tools.with(tool);
        self
    }

    pub fn tools(self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        tools.into_iter().fold(self, |b, t| b.tool(t))
    }

    pub fn handoff(mut self, target: Arc<AgentDefinition>) -> Self {
        self.handoffs.push(target);
        self
    }

    pub fn build(self) -> Result<AgentDefinition> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("Agent name cannot be empty".to_string()));
        }
        if self.instructions.trim().is_empty() {
            return Err(Error::Config(format!("Agent '{}' has no instructions", self.name)));
        }

        let mut seen = std::collections::HashSet::new();
        for target in &self.handoffs {
            let tool = target.transfer_tool_name();
            if self.tools.has(&tool) || !seen.insert(tool.clone()) {
                return Err(Error::Config(format!(
                    "Agent '{}' has conflicting tool name '{}'",
                    self.name, tool
                )));
            }
        }

        Ok(AgentDefinition {
            name: self.name,
            handoff_description: self.handoff_description,
            instructions: self.instructions,
            model: self.model,
            tools: self.tools,
            handoffs: self.handoffs,
        })
    }
}
