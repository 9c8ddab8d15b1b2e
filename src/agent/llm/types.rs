//! Wire types for OpenAI-compatible chat completion responses.

use serde::Deserialize;

/// Top-level chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<CompletionUsage>,
}

/// A single response choice.
#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

/// Assistant message inside a choice.
#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
    /// Absent or `null` when the model answered with plain text.
    #[serde(default)]
    pub tool_calls: Option<Vec<ResponseToolCall>>,
}

/// Tool call requested by the model.
#[derive(Debug, Deserialize)]
pub struct ResponseToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub function: FunctionCall,
}

/// Function name plus JSON-encoded arguments.
#[derive(Debug, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Token usage block.
#[derive(Debug, Deserialize)]
pub struct CompletionUsage {
    #[serde(default)]
    pub prompt_tokens: usize,
    #[serde(default)]
    pub completion_tokens: usize,
    #[serde(default)]
    pub total_tokens: usize,
}
