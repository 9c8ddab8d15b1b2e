//! Switchboard - chat front-ends wired to hosted LLM agents
//!
//! This library provides agent definitions with tools and handoffs, a
//! runner for OpenAI-compatible model endpoints, per-conversation sessions
//! and the CLI and Telegram channels that drive them.

pub mod agent;
pub mod tools;
pub mod adapters;
pub mod config;
pub mod error;
pub mod session;
pub mod ui;

pub use error::{Error, Result};
