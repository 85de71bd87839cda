//! streamchat CLI - Interactive REPL for streaming agent backends
//!
//! Replies are rendered item by item as the agent produces them. Pressing
//! Ctrl-C while a reply is streaming cancels it and returns to the prompt.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use log::debug;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use streamchat::{
    AgentApi, AgentClient, ChatController, ChatEvent, ClientConfig, ResponseInputItem,
    ValidationMode,
};

mod config;
mod display;

use config::AgentConfig;

type Chat = ChatController<AgentClient>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the agent server
    #[arg(long)]
    endpoint: Option<String>,

    /// System prompt sent with every request (empty string disables it)
    #[arg(long)]
    system_prompt: Option<String>,

    /// Path to a TOML configuration file
    /// Defaults to ~/.config/streamchat/config.toml when present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip frames that fail schema validation instead of salvaging them
    #[arg(long)]
    strict: bool,

    /// Wait for the complete response instead of streaming it
    #[arg(long)]
    no_stream: bool,
}

impl Args {
    /// Applies command-line overrides on top of the loaded configuration
    fn apply(self, config: &mut AgentConfig) {
        if let Some(endpoint) = self.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(prompt) = self.system_prompt {
            config.system_prompt = prompt;
        }
        if self.strict {
            config.validation = ValidationMode::Strict;
        }
        if self.no_stream {
            config.streaming = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let mut config = AgentConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    debug!("Loaded configuration: {config:?}");

    let client = AgentClient::new(config.client_config()?)
        .context("Failed to initialize agent client")?;

    let chat = ChatController::new(client).with_event_callback(|event| match event {
        // The user's own input is already on screen.
        ChatEvent::ItemAppended(ResponseInputItem::Input(_)) | ChatEvent::StreamStarted => {}
        ChatEvent::ItemAppended(item) => println!("{}", display::render_item(item)),
        ChatEvent::StreamFinished(outcome) => {
            if let Some(line) = display::render_outcome(outcome) {
                println!("{line}");
            }
        }
    });

    if !chat.client().health_check().await {
        eprintln!(
            "{} agent at {} is not responding",
            "Warning:".yellow(),
            chat.client().base_url()
        );
    }

    let mut rl = DefaultEditor::new()?;
    let history_file = ".streamchat_history";
    if rl.load_history(history_file).is_err() {
        debug!("No previous history found");
    }

    println!("streamchat - connected to {}", chat.client().base_url());
    println!("Commands:");
    println!("  /list             - List all items in the conversation");
    println!("  /clear            - Clear the conversation");
    println!("  /health           - Check that the agent is reachable");
    println!("  /endpoint [url]   - Show or change the agent endpoint");
    println!("  /system [prompt]  - Show or change the system prompt");
    println!("  /quit             - Exit the CLI");
    println!("Press Ctrl-C while a reply is streaming to cancel it.");

    loop {
        let prompt = format!("\n╭─● {}\n╰─○ ", "You".bright_cyan().bold());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                if line.starts_with('/') {
                    if handle_command(line, &chat, &mut config).await {
                        break;
                    }
                    continue;
                }

                send(&chat, line, &config).await;
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {err:?}");
                break;
            }
        }
    }

    rl.save_history(history_file)?;
    println!("Goodbye!");

    Ok(())
}

/// Sends one message, cancelling it if Ctrl-C arrives first
async fn send(chat: &Chat, text: &str, config: &AgentConfig) {
    let system_prompt = config.system_prompt();
    let request = async {
        if config.streaming {
            chat.send(text, system_prompt).await
        } else {
            chat.send_once(text, system_prompt).await
        }
    };
    tokio::pin!(request);

    let result = tokio::select! {
        result = &mut request => result,
        _ = tokio::signal::ctrl_c() => {
            chat.cancel();
            request.await
        }
    };

    if let Err(e) = result {
        eprintln!("{} {e}", "Error:".red());
    }
}

/// Handle CLI commands. Returns `true` when the REPL should exit.
async fn handle_command(command: &str, chat: &Chat, config: &mut AgentConfig) -> bool {
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, rest)| (name, rest.trim()));

    match name {
        "/quit" | "/exit" => return true,
        "/list" => list_items(chat),
        "/clear" => {
            chat.clear_messages();
            println!("Conversation cleared.");
        }
        "/health" => {
            if chat.client().health_check().await {
                println!("{} {}", "Healthy:".green(), chat.client().base_url());
            } else {
                println!("{} {}", "Unreachable:".red(), chat.client().base_url());
            }
        }
        "/endpoint" if rest.is_empty() => println!("Endpoint: {}", chat.client().base_url()),
        "/endpoint" => {
            let candidate = ClientConfig::new(rest);
            if let Err(e) = candidate.validate() {
                println!("{} {e}", "Invalid endpoint:".red());
            } else {
                chat.client().update_base_url(rest);
                config.endpoint = candidate.base_url;
                println!("Endpoint set to {}", chat.client().base_url());
            }
        }
        "/system" if rest.is_empty() => match config.system_prompt() {
            Some(prompt) => println!("System prompt: {prompt}"),
            None => println!("System prompt: (none)"),
        },
        "/system" => {
            config.system_prompt = rest.to_string();
            println!("System prompt updated.");
        }
        _ => {
            println!(
                "Unknown command. Available commands: /list, /clear, /health, /endpoint, /system, /quit"
            );
        }
    }

    false
}

/// List all items in the conversation
fn list_items(chat: &Chat) {
    let items = chat.items();
    if items.is_empty() {
        println!("(empty conversation)");
        return;
    }

    println!("\n=== Conversation ===\n");
    for (idx, item) in items.iter().enumerate() {
        println!("[{idx}] {}", display::render_item(item));
    }
    if let Some(error) = chat.last_error() {
        println!("\nLast error: {}", error.red());
    }
}
