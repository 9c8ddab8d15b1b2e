use colored::*;
use terminal_size::{Width, Height, terminal_size};

use crate::agent::AgentRegistry;

pub fn print_header(profile: &str, model: &str) {
    let (width, _) = terminal_size().unwrap_or((Width(80), Height(24)));
    let width = width.0 as usize;

    let line = "─".repeat(width);
    println!("{}", line.black().bold());

    let name = "Switchboard".yellow().bold();
    let version = format!("v{}", env!("CARGO_PKG_VERSION")).black().bold();
    println!("  ☎  {} {}", name, version);

    let info = format!("  {}  •  {}", profile, model).cyan();
    println!("{}", info);

    println!("{}", line.black().bold());
}

/// List a registry's agents, marking the entry agent and handoff targets.
pub fn print_agents(registry: &AgentRegistry) {
    let entry = registry.entry();
    for agent in registry.agents() {
        let marker = if agent.name() == entry.name() { "▸".green().bold() } else { " ".normal() };
        println!("  {} {}", marker, agent.name().bold());

        if let Some(desc) = agent.handoff_description() {
            println!("      {}", desc.black().bold());
        }
        if !agent.tools().is_empty() {
            println!("      tools: {}", agent.tools().tool_names().join(", ").cyan());
        }
        if !agent.handoffs().is_empty() {
            let targets: Vec<&str> = agent.handoffs().iter().map(|a| a.name()).collect();
            println!("      hands off to: {}", targets.join(", ").cyan());
        }
    }
}

pub fn print_step(msg: &str) {
    println!("  {} {}", "•".green(), msg);
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green().bold(), msg.green());
}

pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠️ ".yellow().bold(), msg.yellow());
}
