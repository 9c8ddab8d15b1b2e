//! Adapters module — chat platform integrations.
//!
//! This module provides channel adapters for different chat platforms.
//! Each adapter implements the [`Channel`] trait for uniform handling and
//! an [`Outbox`] through which sessions talk back to the user.
//!
//! # Supported Channels
//!
//! - **CLI** — Interactive command line interface
//! - **Telegram** — Telegram Bot API via teloxide

pub mod cli;
pub mod telegram;

use async_trait::async_trait;

use crate::config::Config;

/// Outbound side of a chat connection.
///
/// A placeholder is shown as soon as a request starts and is later replaced
/// by the final reply through [`Outbox::update`].
#[async_trait]
pub trait Outbox: Send {
    /// Send a standalone message.
    async fn send(&mut self, content: &str) -> crate::Result<()>;

    /// Show an "in progress" message that a later `update` replaces.
    async fn send_placeholder(&mut self, content: &str) -> crate::Result<()>;

    /// Replace the pending placeholder, or send if there is none.
    async fn update(&mut self, content: &str) -> crate::Result<()>;
}

/// Channel trait for chat adapters.
///
/// All channel implementations must be [`Send`] + [`Sync`] for async compatibility.
pub trait Channel: Send + Sync {
    /// Channel name (e.g., "telegram", "cli").
    fn name(&self) -> &str;

    /// Start listening for messages.
    fn start(&self) -> impl std::future::Future<Output = crate::Result<()>> + Send;

    /// Stop the channel.
    fn stop(&self) -> impl std::future::Future<Output = crate::Result<()>> + Send;
}

/// Channel registry — metadata about available channels.
pub struct ChannelRegistry;

impl ChannelRegistry {
    /// List all available channel names.
    pub fn available() -> &'static [&'static str] {
        &["cli", "telegram"]
    }

    /// Check if a channel is enabled in the config.
    pub fn is_enabled(name: &str, config: &Config) -> bool {
        match name {
            "cli" => true, // CLI is always available
            "telegram" => config.telegram.enabled(),
            _ => false,
        }
    }

    /// Get a human-readable description of a channel.
    pub fn description(name: &str) -> &'static str {
        match name {
            "cli" => "Interactive command line interface",
            "telegram" => "Telegram Bot API",
            _ => "Unknown channel",
        }
    }
}
