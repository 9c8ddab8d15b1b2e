//! Switchboard CLI entry point

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use anyhow::Result;

use switchboard::agent::{AgentRegistry, Profile, RunConfig, Runner};
use switchboard::config::Config;
use switchboard::session::Reply;
use switchboard::ui;

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "☎ Switchboard - chat with hosted LLM agents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agents in the terminal
    Chat {
        /// Message to send to the agent
        #[arg(short, long)]
        message: Option<String>,

        /// Agent set to use (tutor, news, weather)
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Serve the agents over Telegram
    Gateway {
        /// Agent set to use (tutor, news, weather)
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// List the agents of a profile
    Agents {
        /// Agent set to list (tutor, news, weather)
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Show configuration status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Setup Global Ctrl+C handler
    let exit_flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let r = exit_flag.clone();

    ctrlc::set_handler(move || {
        if r.load(std::sync::atomic::Ordering::SeqCst) {
            println!("\n👋 Bye!");
            std::process::exit(0);
        } else {
            println!("\n⚠️  Press Ctrl+C again to exit");
            r.store(true, std::sync::atomic::Ordering::SeqCst);

            // Reset flag after 3 seconds
            let r2 = r.clone();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_secs(3));
                r2.store(false, std::sync::atomic::Ordering::SeqCst);
            });
        }
    }).ok();

    let cli = Cli::parse();

    // Missing credentials abort here, before any session exists.
    let config = switchboard::config::load()?;

    match cli.command {
        Commands::Chat { message, profile } => {
            let profile = resolve_profile(&config, profile)?;
            run_chat(&config, profile, message).await?;
        }

        Commands::Gateway { profile } => {
            let profile = resolve_profile(&config, profile)?;
            run_gateway(config, profile).await?;
        }

        Commands::Agents { profile } => {
            let profile = resolve_profile(&config, profile)?;
            let registry = AgentRegistry::for_profile(profile, &config)?;
            println!("☎ Agents for profile '{}'\n", profile);
            ui::print_agents(&registry);
        }

        Commands::Status => {
            println!("☎ Switchboard Status\n");
            println!("Model: {}", config.model);
            println!("Endpoint: {}", config.base_url);
            println!("API key: {}", config.masked_api_key());
            println!("Search tools: {}", if config.serper_api_key.is_empty() { "not set" } else { "✓" });
            println!("Profile: {}", config.profile);
            println!("Max turns: {}", config.max_turns);
            println!("Tracing: {}", if config.tracing { "on" } else { "off" });
            for name in switchboard::adapters::ChannelRegistry::available() {
                let enabled = switchboard::adapters::ChannelRegistry::is_enabled(name, &config);
                println!(
                    "Channel {}: {} ({})",
                    name,
                    if enabled { "✓" } else { "disabled" },
                    switchboard::adapters::ChannelRegistry::description(name)
                );
            }
        }
    }

    Ok(())
}

fn resolve_profile(config: &Config, flag: Option<String>) -> Result<Profile> {
    match flag {
        Some(name) => Ok(name.parse()?),
        None => Ok(config.profile),
    }
}

async fn run_chat(config: &Config, profile: Profile, message: Option<String>) -> Result<()> {
    use switchboard::adapters::cli::CliChannel;

    let registry = Arc::new(AgentRegistry::for_profile(profile, config)?);
    let run_config: Arc<RunConfig> = Arc::new(config.run_config());
    let runner = Runner::from_config(&run_config);
    let mut channel = CliChannel::new(runner, registry, run_config);

    if let Some(msg) = message {
        // Single message mode
        if let Reply::Failed(_) = channel.run_once(&msg).await {
            std::process::exit(1);
        }
    } else {
        ui::print_header(profile.as_str(), &config.model);
        println!("Interactive mode: 'exit' to quit, '/reset' to clear, '/agents' to list agents\n");
        channel.run_interactive().await?;
    }

    Ok(())
}

async fn run_gateway(config: Config, profile: Profile) -> Result<()> {
    use switchboard::adapters::{Channel, telegram::TelegramChannel};

    if !config.telegram.enabled() {
        ui::print_warning("TELEGRAM_BOT_TOKEN is not set. Set it to run the gateway.");
        return Ok(());
    }

    let registry = Arc::new(AgentRegistry::for_profile(profile, &config)?);
    let run_config = Arc::new(config.run_config());
    let runner = Runner::from_config(&run_config);

    ui::print_step(&format!("Serving profile '{}' with model {}", profile, config.model));
    let channel = TelegramChannel::new(config, registry, run_config, runner);
    ui::print_success("Gateway started. Listening for Telegram messages...");
    channel.start().await?;

    tracing::info!("Gateway stopped, closing {} channel", channel.name());
    channel.stop().await?;
    Ok(())
}
