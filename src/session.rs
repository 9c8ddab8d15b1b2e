//! Per-conversation session state and the request/response loop.
//!
//! A [`Session`] is owned by exactly one chat connection and every mutation
//! goes through `&mut self`, so one conversation never has two runs in
//! flight. The shared pieces (agent registry entries, [`RunConfig`]) are
//! read-only `Arc`s.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::adapters::Outbox;
use crate::agent::{AgentDefinition, AgentRegistry, AgentRunner, Message, Profile, RunConfig};
use crate::error::Error;
use crate::Result;

/// Whether a request is currently being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

/// What the transport ended up showing for one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Final agent output, persisted to history.
    Answer(String),
    /// Error text shown once and not persisted.
    Failed(String),
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Answer(text) | Reply::Failed(text) => text,
        }
    }

    pub fn is_answer(&self) -> bool {
        matches!(self, Reply::Answer(_))
    }
}

/// Human-readable text for a failed run, led by the profile's error marker.
pub fn describe_error(err: &Error, prefix: &str) -> String {
    match err {
        Error::Network(msg) => format!("{prefix} could not reach the model service ({msg})"),
        Error::Auth(msg) => format!("{prefix} the model service rejected the credentials ({msg})"),
        Error::MalformedOutput(msg) => format!("{prefix} the model returned an unusable response ({msg})"),
        other => format!("{prefix} {other}"),
    }
}

/// One conversation: selected agent, history and shared run settings.
pub struct Session {
    id: String,
    profile: Profile,
    agent: Arc<AgentDefinition>,
    history: Vec<Message>,
    run_config: Arc<RunConfig>,
    state: SessionState,
}

impl Session {
    /// Start a session on the registry's entry agent.
    pub fn new(registry: &AgentRegistry, run_config: Arc<RunConfig>) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let agent = registry.entry();
        info!("Session {} started with agent '{}'", id, agent.name());
        Self {
            id,
            profile: registry.profile(),
            agent,
            history: Vec::new(),
            run_config,
            state: SessionState::Idle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn agent(&self) -> &Arc<AgentDefinition> {
        &self.agent
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Send the greeting for this session's profile.
    pub async fn start<O: Outbox + ?Sized>(&self, outbox: &mut O) -> Result<()> {
        outbox.send(self.profile.welcome()).await
    }

    /// Forget the conversation so far.
    pub fn reset(&mut self) {
        info!("Session {} reset ({} messages dropped)", self.id, self.history.len());
        self.history.clear();
    }

    /// Process one user message end to end.
    ///
    /// The runner always sees every earlier successful exchange plus this
    /// message. On failure the error text replaces the placeholder and no
    /// assistant turn is recorded.
    pub async fn handle_message<R, O>(&mut self, text: &str, runner: &R, outbox: &mut O) -> Reply
    where
        R: AgentRunner + ?Sized,
        O: Outbox + ?Sized,
    {
        self.state = SessionState::Running;
        self.history.push(Message::user(text));

        if let Err(e) = outbox.send_placeholder(self.profile.placeholder()).await {
            warn!("Session {}: failed to send placeholder: {}", self.id, e);
        }

        if self.run_config.tracing_enabled {
            info!("Session {}: calling '{}' with {} messages", self.id, self.agent.name(), self.history.len());
        }

        let reply = match runner.run(&self.agent, &self.history, &self.run_config).await {
            Ok(result) => {
                info!(
                    "Session {}: '{}' answered in {} turns ({} chars)",
                    self.id,
                    result.last_agent.name(),
                    result.turns,
                    result.final_output.len()
                );
                self.history.push(Message::assistant(result.final_output.clone()));
                Reply::Answer(result.final_output)
            }
            Err(e) => {
                error!("Session {}: run failed: {}", self.id, e);
                Reply::Failed(describe_error(&e, self.profile.error_prefix()))
            }
        };

        if let Err(e) = outbox.update(reply.text()).await {
            warn!("Session {}: failed to deliver reply: {}", self.id, e);
        }

        self.state = SessionState::Idle;
        reply
    }
}
