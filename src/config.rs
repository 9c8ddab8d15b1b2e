//! Configuration management
//!
//! Resolution order: built-in defaults, then `~/.switchboard/config.json`
//! (optional), then environment variables (a `.env` file in the working
//! directory is loaded into the environment first).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::agent::{Profile, RunConfig};
use crate::error::Error;
use crate::Result;

pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_BASE_URL: &str = "GEMINI_BASE_URL";
pub const ENV_MODEL: &str = "GEMINI_MODEL";
pub const ENV_SERPER_API_KEY: &str = "SERPER_API_KEY";
pub const ENV_TRACING: &str = "SWITCHBOARD_TRACING";
pub const ENV_MAX_TURNS: &str = "SWITCHBOARD_MAX_TURNS";
pub const ENV_PROFILE: &str = "SWITCHBOARD_PROFILE";
pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_ALLOW_FROM: &str = "TELEGRAM_ALLOW_FROM";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Model API key, normally supplied through the environment
    #[serde(default, skip_serializing)]
    pub gemini_api_key: String,

    /// OpenAI-compatible endpoint of the model provider
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Serper API key; search tools are left out when empty
    #[serde(default, skip_serializing)]
    pub serper_api_key: String,

    /// Verbose run tracing
    #[serde(default)]
    pub tracing: bool,

    /// Maximum model calls per run
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Which agent set to serve
    #[serde(default)]
    pub profile: Profile,

    /// Telegram configuration
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default, skip_serializing)]
    pub token: String,

    #[serde(default)]
    pub allow_from: Vec<String>,
}

impl TelegramConfig {
    pub fn enabled(&self) -> bool {
        !self.token.is_empty()
    }
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai/".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_max_turns() -> usize {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            serper_api_key: String::new(),
            tracing: false,
            max_turns: default_max_turns(),
            profile: Profile::default(),
            telegram: TelegramConfig::default(),
        }
    }
}

impl Config {
    /// Resolve configuration against an arbitrary variable lookup.
    ///
    /// Fails with [`Error::Config`] when no model API key is available.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_overrides(lookup)
    }

    /// Overlay variables on top of `self` and validate the result.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = var(ENV_API_KEY) {
            self.gemini_api_key = key;
        }
        if let Some(url) = var(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(model) = var(ENV_MODEL) {
            self.model = model;
        }
        if let Some(key) = var(ENV_SERPER_API_KEY) {
            self.serper_api_key = key;
        }
        if let Some(flag) = var(ENV_TRACING) {
            self.tracing = parse_flag(&flag);
        }
        if let Some(turns) = var(ENV_MAX_TURNS) {
            self.max_turns = turns.trim().parse().map_err(|_| {
                Error::Config(format!("{ENV_MAX_TURNS} must be a positive integer, got {turns:?}"))
            })?;
        }
        if let Some(profile) = var(ENV_PROFILE) {
            self.profile = profile.parse()?;
        }
        if let Some(token) = var(ENV_TELEGRAM_TOKEN) {
            self.telegram.token = token;
        }
        if let Some(list) = var(ENV_TELEGRAM_ALLOW_FROM) {
            self.telegram.allow_from = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.gemini_api_key.trim().is_empty() {
            return Err(Error::Config(format!(
                "{ENV_API_KEY} is not set. Please ensure it is defined in your .env file."
            )));
        }
        if self.max_turns == 0 {
            return Err(Error::Config("max_turns must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Build the run configuration shared by every session.
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            api_key: self.gemini_api_key.clone(),
            tracing_enabled: self.tracing,
            max_turns: self.max_turns,
        }
    }

    /// Model key for display, e.g. `AIza…9f2c`.
    pub fn masked_api_key(&self) -> String {
        mask(&self.gemini_api_key)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".switchboard")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Read a config file, falling back to defaults when it does not exist.
pub fn load_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!("No config file at {:?}, using defaults", path);
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid config file {:?}: {}", path, e)))?;
    Ok(config)
}

/// Load configuration from `.env`, the config file and the process environment.
pub fn load() -> Result<Config> {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {:?}", path),
        Err(e) if e.not_found() => {}
        Err(e) => return Err(Error::Config(format!("Failed to read .env: {e}"))),
    }

    load_file(&config_path())?.with_overrides(|key| std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let vars = env(&[(ENV_MODEL, "gemini-2.0-flash")]);
        let result = Config::from_lookup(|k| vars.get(k).cloned());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_blank_api_key_is_fatal() {
        let vars = env(&[(ENV_API_KEY, "   ")]);
        let result = Config::from_lookup(|k| vars.get(k).cloned());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_defaults_with_api_key() {
        let vars = env(&[(ENV_API_KEY, "secret-key")]);
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.max_turns, 10);
        assert!(!config.tracing);
        assert_eq!(config.profile, Profile::Tutor);
        assert!(!config.telegram.enabled());
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            (ENV_API_KEY, "secret-key"),
            (ENV_MODEL, "gemini-1.5-pro"),
            (ENV_TRACING, "true"),
            (ENV_MAX_TURNS, "4"),
            (ENV_PROFILE, "news"),
            (ENV_TELEGRAM_TOKEN, "123:abc"),
            (ENV_TELEGRAM_ALLOW_FROM, "alice, 42 ,"),
        ]);
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.model, "gemini-1.5-pro");
        assert!(config.tracing);
        assert_eq!(config.max_turns, 4);
        assert_eq!(config.profile, Profile::News);
        assert!(config.telegram.enabled());
        assert_eq!(config.telegram.allow_from, vec!["alice", "42"]);

        let run = config.run_config();
        assert_eq!(run.model, "gemini-1.5-pro");
        assert_eq!(run.max_turns, 4);
        assert!(run.tracing_enabled);
    }

    #[test]
    fn test_invalid_max_turns() {
        let vars = env(&[(ENV_API_KEY, "k"), (ENV_MAX_TURNS, "lots")]);
        assert!(Config::from_lookup(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_config_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"model": "from-file", "max_turns": 3}"#).unwrap();

        let file_config = load_file(&path).unwrap();
        assert_eq!(file_config.model, "from-file");

        let vars = env(&[(ENV_API_KEY, "k"), (ENV_MAX_TURNS, "7")]);
        let config = file_config.with_overrides(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.model, "from-file");
        assert_eq!(config.max_turns, 7);
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_file(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.model, Config::default().model);
    }

    #[test]
    fn test_masked_api_key() {
        assert_eq!(mask("AIzaSyD0123456789f2c"), "AIza…9f2c");
        assert_eq!(mask("short"), "*****");
    }
}
