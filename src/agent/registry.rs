//! Agent registry — the fixed agent sets a process can serve.
//!
//! Registries are built once at startup and shared read-only by every
//! session through an `Arc`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::tools::{NewsTool, SerperClient, Tool, WebSearchTool};
use crate::Result;

use super::definition::AgentDefinition;

/// Agent set selected for a process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Triage agent routing to math, history and SDK tutors.
    #[default]
    Tutor,
    /// World information agent with web search and news tools.
    News,
    /// Single weather agent.
    Weather,
}

impl Profile {
    pub fn all() -> &'static [Profile] {
        &[Profile::Tutor, Profile::News, Profile::Weather]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Tutor => "tutor",
            Profile::News => "news",
            Profile::Weather => "weather",
        }
    }

    /// Greeting sent when a chat starts.
    pub fn welcome(&self) -> &'static str {
        match self {
            Profile::Tutor => "Welcome! How can I assist you today?",
            Profile::News => "🌍 Welcome! Ask me anything about real-time global events.",
            Profile::Weather => "Welcome! Ask me about the weather anywhere.",
        }
    }

    /// Placeholder shown while a run is in flight.
    pub fn placeholder(&self) -> &'static str {
        match self {
            Profile::News => "🔍 Fetching latest information...",
            _ => "Thinking...",
        }
    }

    /// Marker leading the text shown when a run fails.
    pub fn error_prefix(&self) -> &'static str {
        match self {
            Profile::News => "⚠ Error:",
            _ => "Error:",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tutor" => Ok(Profile::Tutor),
            "news" => Ok(Profile::News),
            "weather" => Ok(Profile::Weather),
            other => Err(Error::Config(format!(
                "Unknown profile '{other}' (expected one of: tutor, news, weather)"
            ))),
        }
    }
}

/// A static set of agents plus the one new sessions start with.
#[derive(Debug)]
pub struct AgentRegistry {
    profile: Profile,
    agents: Vec<Arc<AgentDefinition>>,
    entry: Arc<AgentDefinition>,
}

impl AgentRegistry {
    /// Build the registry for a profile.
    pub fn for_profile(profile: Profile, config: &Config) -> Result<Self> {
        let registry = match profile {
            Profile::Tutor => Self::tutor()?,
            Profile::News => {
                let tools: Vec<Arc<dyn Tool>> = if config.serper_api_key.is_empty() {
                    warn!("SERPER_API_KEY is not set; the news agent runs without search tools");
                    Vec::new()
                } else {
                    let client = SerperClient::new(&config.serper_api_key);
                    vec![
                        Arc::new(WebSearchTool::new(client.clone())),
                        Arc::new(NewsTool::new(client)),
                    ]
                };
                Self::news(tools)?
            }
            Profile::Weather => Self::weather()?,
        };

        info!(
            "Agent registry '{}' ready: {} agents, entry '{}'",
            profile,
            registry.agents.len(),
            registry.entry.name()
        );
        Ok(registry)
    }

    /// Triage agent handing off to three specialist tutors.
    pub fn tutor() -> Result<Self> {
        let math = Arc::new(
            AgentDefinition::builder("Math Tutor")
                .instructions(
                    "You provide help with math problems. Explain your reasoning at each step and include examples.",
                )
                .build()?,
        );

        let history = Arc::new(
            AgentDefinition::builder("History Tutor")
                .handoff_description("Specialist agent for historical questions")
                .instructions(
                    "You provide assistance with historical queries. Explain important events and context clearly.",
                )
                .build()?,
        );

        let sdk = Arc::new(
            AgentDefinition::builder("OpenAI SDK Expert")
                .handoff_description(
                    "You are a specialist agent for teaching OpenAI SDK framework for agent development.",
                )
                .instructions(
                    "You provide assistance with OpenAI SDK framework queries. Explain concepts clearly with examples.",
                )
                .build()?,
        );

        let triage = Arc::new(
            AgentDefinition::builder("Triage Agent")
                .instructions("You determine which agent to use based on the user's query.")
                .handoff(history.clone())
                .handoff(math.clone())
                .handoff(sdk.clone())
                .build()?,
        );

        Ok(Self {
            profile: Profile::Tutor,
            agents: vec![triage.clone(), math, history, sdk],
            entry: triage,
        })
    }

    /// World information agent with the given tools attached at build time.
    pub fn news(tools: Vec<Arc<dyn Tool>>) -> Result<Self> {
        let agent = Arc::new(
            AgentDefinition::builder("World Information & News AI")
                .instructions(
                    "You provide real-time global news updates and world information using Google Search and News.",
                )
                .tools(tools)
                .build()?,
        );

        Ok(Self {
            profile: Profile::News,
            agents: vec![agent.clone()],
            entry: agent,
        })
    }

    pub fn weather() -> Result<Self> {
        let agent = Arc::new(
            AgentDefinition::builder("weather agent")
                .instructions("Always provide the current weather.")
                .build()?,
        );

        Ok(Self {
            profile: Profile::Weather,
            agents: vec![agent.clone()],
            entry: agent,
        })
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Agent every new session starts with.
    pub fn entry(&self) -> Arc<AgentDefinition> {
        self.entry.clone()
    }

    pub fn agents(&self) -> &[Arc<AgentDefinition>] {
        &self.agents
    }
}
