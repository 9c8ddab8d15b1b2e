//! Agent module — agent definitions and run execution.
//!
//! This module contains:
//! - Message types shared by history and model calls
//! - Agent definitions, their builder and the static registries
//! - LLM client trait and the OpenAI-compatible implementation
//! - The runner that executes one agent run (tools + handoffs)

mod definition;
mod message;
mod registry;
mod runner;

// LLM providers in submodule
pub mod llm;

// Re-exports for convenience
pub use definition::{AgentBuilder, AgentDefinition};
pub use llm::{LlmClient, LlmResponse, OpenAiCompatClient, Usage};
pub use message::{Message, Role, ToolCallRequest};
pub use registry::{AgentRegistry, Profile};
pub use runner::{AgentRunner, RunConfig, RunResult, Runner};
