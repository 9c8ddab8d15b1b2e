//! LLM client abstraction layer.
//!
//! This module provides:
//! - [`LlmClient`] trait for swappable LLM providers
//! - [`OpenAiCompatClient`] for any OpenAI-compatible chat completions
//!   endpoint (Gemini is reached this way)

mod types;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::tools::ToolDefinition;
use crate::Result;

pub use types::*;

pub mod openai_compat;

pub use openai_compat::OpenAiCompatClient;

use super::message::{Message, ToolCallRequest};

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Text content of the response.
    pub content: Option<String>,

    /// Tool calls requested by the LLM.
    pub tool_calls: Vec<ToolCallRequest>,

    /// Reason the response finished.
    pub finish_reason: String,

    /// Token usage statistics.
    pub usage: Usage,
}

impl LlmResponse {
    /// Create a simple text response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: vec![],
            finish_reason: "stop".to_string(),
            usage: Usage::default(),
        }
    }

    /// Create a response that only requests tool calls.
    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls: calls,
            finish_reason: "tool_calls".to_string(),
            usage: Usage::default(),
        }
    }

    /// Check if response has tool calls.
    #[inline]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// LLM client trait — swappable provider abstraction.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send messages and get response.
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse>;
}

/// Fake LLM client for testing.
///
/// Replays queued responses and records every request it receives.
#[cfg(test)]
pub struct FakeLlmClient {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<LlmResponse>>>,
    pub requests: std::sync::Mutex<Vec<(String, Vec<Message>, Vec<ToolDefinition>)>>,
}

#[cfg(test)]
impl FakeLlmClient {
    /// Create with predefined text responses.
    pub fn new(responses: Vec<&str>) -> Self {
        Self::scripted(responses.into_iter().map(|s| Ok(LlmResponse::text(s))).collect())
    }

    /// Create with an arbitrary script of responses and errors.
    pub fn scripted(script: Vec<Result<LlmResponse>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(script.into()),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create with a single tool call followed by a text response.
    pub fn with_tool_call(name: &str, args: serde_json::Value, final_response: &str) -> Self {
        Self::scripted(vec![
            Ok(LlmResponse::tool_calls(vec![ToolCallRequest {
                id: "tc_1".to_string(),
                name: name.to_string(),
                arguments: args,
            }])),
            Ok(LlmResponse::text(final_response)),
        ])
    }
}

#[cfg(test)]
#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((model.to_string(), messages.to_vec(), tools.to_vec()));

        let mut responses = self.responses.lock().unwrap();
        responses
            .pop_front()
            .unwrap_or_else(|| Err(crate::error::Error::Llm("No more fake responses".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_llm_client() {
        let client = FakeLlmClient::new(vec!["Hello!", "World!"]);

        let resp1 = client.chat("m", &[], &[]).await.unwrap();
        assert_eq!(resp1.content.as_deref(), Some("Hello!"));

        let resp2 = client.chat("m", &[], &[]).await.unwrap();
        assert_eq!(resp2.content.as_deref(), Some("World!"));

        assert!(client.chat("m", &[], &[]).await.is_err());
        assert_eq!(client.requests.lock().unwrap().len(), 3);
    }
}
