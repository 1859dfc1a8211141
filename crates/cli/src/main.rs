//! codechat CLI
//!
//! Main entry point for the codechat command-line tool.
//! Answers questions about a code base indexed in Cortex Search, with
//! optional evaluation of every answer.

mod commands;
mod pipeline;

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};
use codechat_core::logging::{self, LogOptions};
use codechat_core::{config::AppConfig, AppResult};
use commands::{AskCommand, ChatCommand, PromptsCommand};
use pipeline::ChatPipeline;
use std::path::PathBuf;
use tracing::Instrument;

/// codechat - ask questions about your code
#[derive(Parser, Debug)]
#[command(name = "codechat")]
#[command(about = "Retrieval-augmented questions over an indexed code base", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "CODECHAT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "CODECHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Completion provider (cortex, ollama)
    #[arg(short, long, global = true, env = "CODECHAT_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "CODECHAT_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask one question
    Ask(AskCommand),

    /// Ask questions interactively
    Chat(ChatCommand),

    /// List prompt definitions
    Prompts(PromptsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from .env, environment and config file
    let config = AppConfig::load_from(cli.workspace.as_deref(), cli.config.as_deref())?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.json_logs,
    );

    // Initialize logging with final configuration
    logging::init_logging(&LogOptions {
        level: config.log_level.as_deref(),
        no_color: config.no_color,
        json: config.json_logs,
    })?;

    config.validate()?;

    tracing::info!("codechat starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Chat(_) => "chat",
        Commands::Prompts(_) => "prompts",
    };
    let span = tracing::info_span!("command", name = command_name);

    let result = async {
        match cli.command {
            Commands::Ask(cmd) => {
                let pipeline = ChatPipeline::from_config(&config)?;
                cmd.execute(&config, &pipeline).await
            }
            Commands::Chat(cmd) => {
                let pipeline = ChatPipeline::from_config(&config)?;
                cmd.execute(&pipeline).await
            }
            Commands::Prompts(cmd) => cmd.execute(&config).await,
        }
    }
    .instrument(span)
    .await;

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
