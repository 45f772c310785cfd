//! # switchboard CLI
//!
//! Command-line front end for Switchboard: send one chat turn to a configured
//! provider and let the model call tools along the way.
//!
//! ## Usage
//!
//! - `switchboard chat "Read file notes.txt"` - Run one turn on the default provider
//! - `switchboard --provider qwen chat "..."` - Pick a provider
//! - `switchboard tools` - Show available tools
//! - `switchboard providers --probe` - Show providers and initialize each one

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod config;

use commands::{chat_command, providers_command, tools_command, ChatArgs};
use config::CliConfigLoader;

/// switchboard - multi-provider chat with a single tool-calling round trip
#[derive(Parser)]
#[command(name = "switchboard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Send a chat turn to Claude, DeepSeek or Qwen with tool calling")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file or directory path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Provider id to use (claude, deepseek, qwen or one from the config)
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// API key override for the selected provider
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Base URL override for the selected provider
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Model name override for the selected provider
    #[arg(long, global = true)]
    model: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one chat turn and print the answer
    Chat {
        /// The user message
        message: String,

        /// Replace the default system preamble
        #[arg(long)]
        system: Option<String>,

        /// Print the reply or failure as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show available tools
    Tools,

    /// Show configured providers and their status
    Providers {
        /// Initialize (and probe) every provider before listing
        #[arg(long)]
        probe: bool,
    },
}

/// Build a configuration loader from CLI arguments
fn build_config_loader(cli: &Cli) -> CliConfigLoader {
    let mut loader = CliConfigLoader::new();

    if let Some(config_path) = &cli.config {
        loader = loader.with_config_override(config_path.clone());
    }

    if let Some(provider) = &cli.provider {
        loader = loader.with_provider_override(provider.clone());
    }

    if let Some(api_key) = &cli.api_key {
        loader = loader.with_api_key_override(api_key.clone());
    }

    if let Some(base_url) = &cli.base_url {
        loader = loader.with_base_url_override(base_url.clone());
    }

    if let Some(model) = &cli.model {
        loader = loader.with_model_override(model.clone());
    }

    if let Commands::Chat {
        system: Some(system),
        ..
    } = &cli.command
    {
        loader = loader.with_preamble_override(system.clone());
    }

    loader
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so answers on stdout stay clean
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_loader = build_config_loader(&cli);

    match cli.command {
        Commands::Chat { message, json, .. } => {
            chat_command(ChatArgs { message, json }, config_loader).await
        }
        Commands::Tools => tools_command(config_loader).await.map(|_| ExitCode::SUCCESS),
        Commands::Providers { probe } => providers_command(config_loader, probe)
            .await
            .map(|_| ExitCode::SUCCESS),
    }
}
