//! Agent runner - executes one run of an agent over a conversation.
//!
//! A run repeatedly calls the model with the current agent's instructions
//! and the conversation so far, executes requested tools, follows handoffs
//! to other agents, and ends with the first plain-text answer.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::Result;

use super::definition::AgentDefinition;
use super::llm::{LlmClient, OpenAiCompatClient, Usage};
use super::message::{Message, ToolCallRequest};

/// Logs at `info` when run tracing is enabled, otherwise at `debug`.
macro_rules! run_event {
    ($config:expr, $($arg:tt)+) => {
        if $config.tracing_enabled {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// Settings shared read-only by every run in the process.
#[derive(Clone)]
pub struct RunConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub tracing_enabled: bool,
    pub max_turns: usize,
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("tracing_enabled", &self.tracing_enabled)
            .field("max_turns", &self.max_turns)
            .finish()
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub final_output: String,
    /// Agent that produced the final output (differs from the starting
    /// agent after a handoff).
    pub last_agent: Arc<AgentDefinition>,
    pub usage: Usage,
    /// Number of model calls made.
    pub turns: usize,
}

/// The LLM execution boundary seen by sessions.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Run `agent` over the full `history` and return its final answer.
    async fn run(
        &self,
        agent: &Arc<AgentDefinition>,
        history: &[Message],
        config: &RunConfig,
    ) -> Result<RunResult>;
}

/// Runner backed by an [`LlmClient`].
pub struct Runner<C: LlmClient> {
    client: C,
}

impl Runner<OpenAiCompatClient> {
    /// Runner talking to the endpoint named in `config`.
    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(OpenAiCompatClient::new(&config.api_key, &config.base_url))
    }
}

impl<C: LlmClient> Runner<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    async fn execute_tool(
        &self,
        agent: &AgentDefinition,
        call: &ToolCallRequest,
        config: &RunConfig,
    ) -> String {
        run_event!(config, "Agent '{}' calling tool {} with {}", agent.name(), call.name, call.arguments);

        match agent.tools().execute(&call.name, call.arguments.clone()).await {
            Ok(result) => {
                debug!("Tool {} succeeded: {} chars", call.name, result.len());
                result
            }
            Err(e) => {
                let error_msg = format!("Error: {}", e);
                debug!("Tool {} failed: {}", call.name, error_msg);
                error_msg
            }
        }
    }
}

#[async_trait]
impl<C: LlmClient> AgentRunner for Runner<C> {
    async fn run(
        &self,
        agent: &Arc<AgentDefinition>,
        history: &[Message],
        config: &RunConfig,
    ) -> Result<RunResult> {
        let mut current = agent.clone();
        let mut transcript: Vec<Message> = history.to_vec();
        let mut usage = Usage::default();

        run_event!(config, "Starting run with agent '{}' over {} messages", current.name(), history.len());

        for turn in 0..config.max_turns {
            let mut messages = Vec::with_capacity(transcript.len() + 1);
            messages.push(Message::system(current.system_prompt()));
            messages.extend(transcript.iter().cloned());

            let model = current.model().unwrap_or(&config.model);
            let tools = current.tool_definitions();

            debug!("Turn {}/{} with agent '{}'", turn + 1, config.max_turns, current.name());
            let response = self.client.chat(model, &messages, &tools).await?;
            debug!(
                "Agent '{}' turn {} finished: {} ({} tool calls)",
                current.name(),
                turn + 1,
                response.finish_reason,
                response.tool_calls.len()
            );
            if response.finish_reason == "length" {
                warn!("Agent '{}' hit the model's output limit; the reply may be truncated", current.name());
            }

            usage.prompt_tokens += response.usage.prompt_tokens;
            usage.completion_tokens += response.usage.completion_tokens;
            usage.total_tokens += response.usage.total_tokens;

            if !response.has_tool_calls() {
                let final_output = response
                    .content
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| Error::MalformedOutput("Model returned an empty response".to_string()))?;

                run_event!(config, "Agent '{}' completed with response: {} chars", current.name(), final_output.len());
                return Ok(RunResult {
                    final_output,
                    last_agent: current,
                    usage,
                    turns: turn + 1,
                });
            }

            transcript.push(Message::assistant_with_tools(
                response.content.clone().unwrap_or_default(),
                response.tool_calls.clone(),
            ));

            let mut next_agent: Option<Arc<AgentDefinition>> = None;
            for call in &response.tool_calls {
                let result = match current.find_handoff(&call.name) {
                    Some(_) if next_agent.is_some() => {
                        "Multiple handoffs detected, ignoring this one.".to_string()
                    }
                    Some(target) => {
                        next_agent = Some(target.clone());
                        json!({ "assistant": target.name() }).to_string()
                    }
                    None => self.execute_tool(&current, call, config).await,
                };
                transcript.push(Message::tool_result(&call.id, result));
            }

            if let Some(next) = next_agent {
                run_event!(config, "Handoff from '{}' to '{}'", current.name(), next.name());
                current = next;
            }
        }

        Err(Error::MaxTurns(config.max_turns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::llm::{FakeLlmClient, LlmResponse};
    use crate::agent::message::Role;
    use crate::agent::AgentRegistry;
    use crate::tools::DummyTool;

    fn config(max_turns: usize) -> RunConfig {
        RunConfig {
            model: "gemini-2.0-flash".to_string(),
            base_url: "http://localhost".to_string(),
            api_key: "key".to_string(),
            tracing_enabled: false,
            max_turns,
        }
    }

    fn solo_agent() -> Arc<AgentDefinition> {
        Arc::new(
            AgentDefinition::builder("Solo")
                .instructions("Answer briefly.")
                .tool(Arc::new(DummyTool { name: "lookup".into(), result: "42".into() }))
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_run_simple() {
        let runner = Runner::new(FakeLlmClient::new(vec!["Hello, human!"]));
        let history = vec![Message::user("Hi there")];

        let result = runner.run(&solo_agent(), &history, &config(10)).await.unwrap();

        assert_eq!(result.final_output, "Hello, human!");
        assert_eq!(result.turns, 1);
        assert_eq!(result.last_agent.name(), "Solo");
    }

    #[tokio::test]
    async fn test_run_receives_full_history() {
        let runner = Runner::new(FakeLlmClient::new(vec!["third answer"]));
        let history = vec![
            Message::user("one"),
            Message::assistant("first answer"),
            Message::user("two"),
        ];

        runner.run(&solo_agent(), &history, &config(10)).await.unwrap();

        let requests = runner.client.requests.lock().unwrap();
        let (model, messages, tools) = &requests[0];
        assert_eq!(model, "gemini-2.0-flash");
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(&messages[1..], &history[..]);
        assert_eq!(tools[0].name, "lookup");
    }

    #[tokio::test]
    async fn test_run_with_tool() {
        let client = FakeLlmClient::with_tool_call("lookup", json!({"q": "answer"}), "The answer is 42");
        let runner = Runner::new(client);

        let result = runner
            .run(&solo_agent(), &[Message::user("What is the answer?")], &config(10))
            .await
            .unwrap();
        assert_eq!(result.final_output, "The answer is 42");
        assert_eq!(result.turns, 2);

        let requests = runner.client.requests.lock().unwrap();
        let second = &requests[1].1;
        let tool_msg = second.last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.content, "42");
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("tc_1"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let client = FakeLlmClient::with_tool_call("missing", json!({}), "Sorry");
        let runner = Runner::new(client);

        runner.run(&solo_agent(), &[Message::user("x")], &config(10)).await.unwrap();

        let requests = runner.client.requests.lock().unwrap();
        let tool_msg = requests[1].1.last().unwrap();
        assert!(tool_msg.content.starts_with("Error: "));
        assert!(tool_msg.content.contains("Unknown tool: missing"));
    }

    #[tokio::test]
    async fn test_handoff_switches_agent() {
        let registry = AgentRegistry::tutor().unwrap();
        let client = FakeLlmClient::with_tool_call("transfer_to_math_tutor", json!({}), "2 + 2 = 4");
        let runner = Runner::new(client);

        let result = runner
            .run(&registry.entry(), &[Message::user("What is 2 + 2?")], &config(10))
            .await
            .unwrap();

        assert_eq!(result.final_output, "2 + 2 = 4");
        assert_eq!(result.last_agent.name(), "Math Tutor");

        let requests = runner.client.requests.lock().unwrap();
        assert!(requests[0].2.iter().any(|t| t.name == "transfer_to_math_tutor"));
        assert!(requests[1].1[0].content.starts_with("You provide help with math problems"));
        assert!(requests[1].2.is_empty());
        assert_eq!(requests[1].1.last().unwrap().content, r#"{"assistant":"Math Tutor"}"#);
    }

    #[tokio::test]
    async fn test_max_turns() {
        let call = |id: &str| ToolCallRequest { id: id.into(), name: "lookup".into(), arguments: json!({}) };
        let client = FakeLlmClient::scripted(vec![
            Ok(LlmResponse::tool_calls(vec![call("a")])),
            Ok(LlmResponse::tool_calls(vec![call("b")])),
        ]);
        let runner = Runner::new(client);

        let result = runner.run(&solo_agent(), &[Message::user("loop")], &config(2)).await;
        assert!(matches!(result, Err(Error::MaxTurns(2))));
    }

    #[tokio::test]
    async fn test_truncated_output_is_still_returned() {
        let mut truncated = LlmResponse::text("The answer is");
        truncated.finish_reason = "length".to_string();
        let runner = Runner::new(FakeLlmClient::scripted(vec![Ok(truncated)]));

        let result = runner.run(&solo_agent(), &[Message::user("hi")], &config(3)).await.unwrap();
        assert_eq!(result.final_output, "The answer is");
    }

    #[tokio::test]
    async fn test_empty_output_is_malformed() {
        let client = FakeLlmClient::scripted(vec![Ok(LlmResponse::text("  "))]);
        let runner = Runner::new(client);

        let result = runner.run(&solo_agent(), &[Message::user("hi")], &config(3)).await;
        assert!(matches!(result, Err(Error::MalformedOutput(_))));
    }

    #[tokio::test]
    async fn test_client_error_propagates() {
        let client = FakeLlmClient::scripted(vec![Err(Error::Auth("401".into()))]);
        let runner = Runner::new(client);

        let result = runner.run(&solo_agent(), &[Message::user("hi")], &config(3)).await;
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[tokio::test]
    async fn test_agent_model_override() {
        let agent = Arc::new(
            AgentDefinition::builder("Pinned")
                .instructions("Hi.")
                .model("gemini-1.5-pro")
                .build()
                .unwrap(),
        );
        let runner = Runner::new(FakeLlmClient::new(vec!["ok"]));
        runner.run(&agent, &[Message::user("hi")], &config(1)).await.unwrap();

        assert_eq!(runner.client.requests.lock().unwrap()[0].0, "gemini-1.5-pro");
    }

    #[test]
    fn test_run_config_debug_redacts_key() {
        let printed = format!("{:?}", config(1));
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("\"key\""));
    }
}
