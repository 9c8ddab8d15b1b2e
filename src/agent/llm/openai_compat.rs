//! Client for OpenAI-compatible chat completion endpoints.
//!
//! Gemini exposes one at `https://generativelanguage.googleapis.com/v1beta/openai/`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::Error;
use crate::tools::ToolDefinition;
use crate::Result;

use super::super::message::{Message, Role, ToolCallRequest};
use super::{ChatCompletionResponse, LlmClient, LlmResponse, Usage};

/// Chat completions client authenticated with a bearer API key.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    api_key: String,
    base_url: String,
    client: Client,
}

impl OpenAiCompatClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn build_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| match m.role {
                Role::Tool => json!({
                    "role": "tool",
                    "tool_call_id": m.tool_call_id.as_deref().unwrap_or("unknown"),
                    "content": m.content
                }),
                Role::Assistant if m.tool_calls.is_some() => {
                    let calls: Vec<Value> = m
                        .tool_calls
                        .iter()
                        .flatten()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    "arguments": tc.arguments.to_string()
                                }
                            })
                        })
                        .collect();

                    let content = if m.content.is_empty() { Value::Null } else { json!(m.content) };
                    json!({
                        "role": "assistant",
                        "content": content,
                        "tool_calls": calls
                    })
                }
                role => json!({
                    "role": role,
                    "content": m.content
                }),
            })
            .collect()
    }

    fn convert_tools(&self, tools: &[ToolDefinition]) -> Option<Value> {
        if tools.is_empty() {
            return None;
        }

        let functions: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters
                    }
                })
            })
            .collect();

        Some(Value::Array(functions))
    }

    fn parse_response(&self, response: ChatCompletionResponse) -> Result<LlmResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::MalformedOutput("No choices in response".to_string()))?;

        let calls = choice.message.tool_calls.unwrap_or_default();
        let mut tool_calls = Vec::with_capacity(calls.len());
        for (i, call) in calls.into_iter().enumerate() {
            let raw_arguments = call.function.arguments.unwrap_or_default();
            let arguments = if raw_arguments.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&raw_arguments).map_err(|e| {
                    Error::MalformedOutput(format!(
                        "Invalid arguments for tool '{}': {}",
                        call.function.name, e
                    ))
                })?
            };

            tool_calls.push(ToolCallRequest {
                id: call.id.filter(|id| !id.is_empty()).unwrap_or_else(|| format!("tc_{i}")),
                name: call.function.name,
                arguments,
            });
        }

        let usage = response
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content: choice.message.content,
            tool_calls,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }
}

/// Map a non-success status and body to a typed error.
fn status_error(status: StatusCode, body: &str) -> Error {
    let invalid_key = body.contains("API_KEY_INVALID") || body.contains("API key not valid");
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Error::Auth(format!("{status}: {body}"))
    } else if status == StatusCode::BAD_REQUEST && invalid_key {
        Error::Auth(format!("{status}: {body}"))
    } else {
        Error::Llm(format!("Model API error {status}: {body}"))
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        let mut request = json!({
            "model": model,
            "messages": self.convert_messages(messages),
        });

        if let Some(tool_config) = self.convert_tools(tools) {
            request["tools"] = tool_config;
        }

        debug!("POST {} ({} messages, {} tools)", self.build_url(), messages.len(), tools.len());

        let response = self
            .client
            .post(self.build_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedOutput(format!("Unexpected response body: {e}")))?;
        self.parse_response(parsed)
    }
}
