//! Pagecite CLI
//!
//! Main entry point for the pagecite command-line tool.
//! Answers questions over local documents with page-level citations, either
//! one-shot on the terminal or as a streaming HTTP service.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ServeCommand};
use pagecite_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;
use tracing::Instrument;

/// Pagecite - cited answers over your documents
#[derive(Parser, Debug)]
#[command(name = "pagecite")]
#[command(about = "Cited answers over local documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "PAGECITE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Generation model identifier
    #[arg(short, long, global = true, env = "PAGECITE_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask one question over the given documents
    Ask(AskCommand),

    /// Serve the streaming chat API
    Serve(ServeCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_in(cli.workspace.clone())?.with_overrides(
        cli.workspace,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    if cli.json_logs {
        config.json_logs = true;
    }

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.json_logs)?;

    tracing::info!("Pagecite starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Model: {}", config.generation.model);

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Serve(_) => "serve",
    };
    let span = tracing::info_span!("command", name = command_name);

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).instrument(span).await,
        Commands::Serve(cmd) => cmd.execute(&config).instrument(span).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!(kind = e.kind(), "Command failed: {}", e),
    }

    result
}
