//! Telegram adapter using teloxide
//!
//! Every chat gets its own [`Session`], created on `/start` or on the first
//! message, guarded by its own lock so a chat's messages run one at a time.
//! `/start` replaces the chat's session, and sessions left idle longer than
//! the idle timeout are dropped.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::MessageId;
use tokio::sync::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, error, debug};

use crate::Result;
use crate::config::Config;
use crate::agent::{AgentRegistry, AgentRunner, RunConfig};
use crate::session::Session;
use super::{Channel, Outbox};

/// Telegram rejects text messages longer than this many characters.
const MAX_MESSAGE_CHARS: usize = 4096;

const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Split text into chunks Telegram accepts, preferring line breaks.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Outbox bound to one Telegram chat; the placeholder is edited in place.
pub struct TelegramOutbox {
    bot: Bot,
    chat_id: ChatId,
    placeholder: Option<MessageId>,
}

impl TelegramOutbox {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id, placeholder: None }
    }
}

#[async_trait]
impl Outbox for TelegramOutbox {
    async fn send(&mut self, content: &str) -> Result<()> {
        for chunk in split_message(content, MAX_MESSAGE_CHARS) {
            self.bot.send_message(self.chat_id, chunk).await?;
        }
        Ok(())
    }

    async fn send_placeholder(&mut self, content: &str) -> Result<()> {
        let sent = self.bot.send_message(self.chat_id, content).await?;
        self.placeholder = Some(sent.id);
        Ok(())
    }

    async fn update(&mut self, content: &str) -> Result<()> {
        let Some(id) = self.placeholder.take() else {
            return self.send(content).await;
        };

        let mut chunks = split_message(content, MAX_MESSAGE_CHARS).into_iter();
        if let Some(first) = chunks.next() {
            self.bot.edit_message_text(self.chat_id, id, first).await?;
        }
        for chunk in chunks {
            self.bot.send_message(self.chat_id, chunk).await?;
        }
        Ok(())
    }
}

/// A chat's session and when it was last handed out.
struct ChatSession {
    session: Arc<Mutex<Session>>,
    last_seen: Instant,
}

/// Telegram channel adapter
pub struct TelegramChannel<R: AgentRunner + 'static> {
    bot: Bot,
    config: Config,
    registry: Arc<AgentRegistry>,
    run_config: Arc<RunConfig>,
    runner: Arc<R>,
    sessions: Arc<Mutex<HashMap<ChatId, ChatSession>>>,
    idle_timeout: Duration,
}

impl<R: AgentRunner + 'static> TelegramChannel<R> {
    pub fn new(config: Config, registry: Arc<AgentRegistry>, run_config: Arc<RunConfig>, runner: R) -> Self {
        let bot = Bot::new(&config.telegram.token);
        Self {
            bot,
            config,
            registry,
            run_config,
            runner: Arc::new(runner),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout: SESSION_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Session for a chat, created on first use.
    ///
    /// Other chats' sessions that are idle past the timeout and not in use
    /// are evicted on the way.
    async fn session(&self, chat_id: ChatId) -> Arc<Mutex<Session>> {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();

        let before = sessions.len();
        sessions.retain(|id, chat| {
            *id == chat_id
                || Arc::strong_count(&chat.session) > 1
                || now.duration_since(chat.last_seen) < self.idle_timeout
        });
        if sessions.len() < before {
            debug!("Evicted {} idle Telegram sessions", before - sessions.len());
        }

        let chat = sessions.entry(chat_id).or_insert_with(|| ChatSession {
            session: Arc::new(Mutex::new(Session::new(&self.registry, self.run_config.clone()))),
            last_seen: now,
        });
        chat.last_seen = now;
        chat.session.clone()
    }

    /// Forget a chat's session; the next message starts a fresh one.
    async fn end_session(&self, chat_id: ChatId) {
        if self.sessions.lock().await.remove(&chat_id).is_some() {
            info!("Ended Telegram session for chat {}", chat_id);
        }
    }

    async fn handle_message(&self, message: teloxide::types::Message) -> Result<()> {
        let chat_id = message.chat.id;
        let user = message.from();

        // Authorization check
        if !self.is_allowed(user) {
            debug!("Ignoring message from unauthorized user: {:?}", user);
            return Ok(());
        }

        let Some(text) = message.text() else {
            return Ok(()); // Ignore non-text messages for now
        };

        info!("Received message from {}: {}", chat_id, text);

        let mut outbox = TelegramOutbox::new(self.bot.clone(), chat_id);

        if matches!(text.trim(), "/start" | "/reset") {
            self.end_session(chat_id).await;
            let session = self.session(chat_id).await;
            let session = session.lock().await;
            return session.start(&mut outbox).await;
        }

        let session = self.session(chat_id).await;
        let mut session = session.lock().await;

        let _ = self.bot.send_chat_action(chat_id, teloxide::types::ChatAction::Typing).await;
        session.handle_message(text, self.runner.as_ref(), &mut outbox).await;

        Ok(())
    }

    fn is_allowed(&self, user: Option<&teloxide::types::User>) -> bool {
        let allow_from = &self.config.telegram.allow_from;
        if allow_from.is_empty() {
            return true;
        }

        let Some(user) = user else { return false };
        let username = user.username.as_deref().unwrap_or("");
        let id = user.id.to_string();

        allow_from.iter().any(|allowed| allowed == username || allowed == &id)
    }
}

// Helper to wrap the event loop
async fn run_telegram_loop<R: AgentRunner + 'static>(channel: Arc<TelegramChannel<R>>) {
    let handler = Update::filter_message()
        .endpoint(move |_bot: Bot, msg: teloxide::types::Message, channel: Arc<TelegramChannel<R>>| async move {
            if let Err(e) = channel.handle_message(msg).await {
                error!("Error handling telegram message: {}", e);
            }
            respond(())
        });

    Dispatcher::builder(channel.bot.clone(), handler)
        .dependencies(dptree::deps![channel])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

impl<R: AgentRunner + 'static> Channel for TelegramChannel<R> {
    fn name(&self) -> &str {
        "telegram"
    }

    fn start(&self) -> impl std::future::Future<Output = Result<()>> + Send {
        let this = Arc::new(Self {
            bot: self.bot.clone(),
            config: self.config.clone(),
            registry: self.registry.clone(),
            run_config: self.run_config.clone(),
            runner: self.runner.clone(),
            sessions: self.sessions.clone(),
            idle_timeout: self.idle_timeout,
        });

        async move {
            info!("Starting Telegram bot for profile '{}'...", this.registry.profile());
            run_telegram_loop(this).await;
            Ok(())
        }
    }

    fn stop(&self) -> impl std::future::Future<Output = Result<()>> + Send {
        let sessions = self.sessions.clone();
        async move {
            // Dispatcher stops on Ctrl+C; dropping sessions ends their conversations.
            sessions.lock().await.clear();
            Ok(())
        }
    }
}
