//! CLI adapter — interactive and single-message command line interface.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::agent::{AgentRegistry, AgentRunner, RunConfig};
use crate::session::{Reply, Session};
use crate::ui;
use crate::Result;

use super::Outbox;

/// Terminal outbox: placeholder is a spinner, replies are printed.
#[derive(Default)]
pub struct CliOutbox {
    spinner: Option<ProgressBar>,
}

#[async_trait]
impl Outbox for CliOutbox {
    async fn send(&mut self, content: &str) -> Result<()> {
        println!("\n{}", content);
        Ok(())
    }

    async fn send_placeholder(&mut self, content: &str) -> Result<()> {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("  {spinner:.magenta} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(content.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
        Ok(())
    }

    async fn update(&mut self, content: &str) -> Result<()> {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }

        let error = content
            .strip_prefix("⚠ Error:")
            .or_else(|| content.strip_prefix("Error:"));
        match error {
            Some(detail) => println!("\n{} {}\n", "Error".red().bold(), detail.trim()),
            None => println!("\n{}: {}\n", "Bot".green().bold(), content),
        }
        Ok(())
    }
}

/// CLI channel: one session for the lifetime of the process.
pub struct CliChannel<R: AgentRunner> {
    runner: R,
    registry: Arc<AgentRegistry>,
    session: Session,
    outbox: CliOutbox,
}

impl<R: AgentRunner> CliChannel<R> {
    /// Create a new CLI channel.
    pub fn new(runner: R, registry: Arc<AgentRegistry>, run_config: Arc<RunConfig>) -> Self {
        let session = Session::new(&registry, run_config);
        Self {
            runner,
            registry,
            session,
            outbox: CliOutbox::default(),
        }
    }

    /// Run a single message and return what was shown.
    pub async fn run_once(&mut self, message: &str) -> Reply {
        self.session
            .handle_message(message, &self.runner, &mut self.outbox)
            .await
    }

    /// Run interactive REPL loop.
    pub async fn run_interactive(&mut self) -> Result<()> {
        self.session.start(&mut self.outbox).await?;

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("{}: ", "You".blue().bold());
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                // EOF
                break;
            }

            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            match input.to_lowercase().as_str() {
                "exit" | "quit" | "q" => {
                    println!("👋 Bye!");
                    break;
                }
                "/reset" => {
                    self.session.reset();
                    ui::print_success("Conversation cleared");
                    continue;
                }
                "/agents" => {
                    ui::print_agents(&self.registry);
                    continue;
                }
                _ => {}
            }

            self.run_once(input).await;
        }

        Ok(())
    }

    /// Get current history length.
    pub fn history_len(&self) -> usize {
        self.session.history().len()
    }
}
