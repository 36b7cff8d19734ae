//! Scout CLI
//!
//! Main entry point for the scout command-line tool.
//! Answers project questions from routed knowledge sources and manages the
//! local records those sources read from.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, HistoryCommand, IngestCommand, SourcesCommand};
use scout_core::logging::{self, LogFormat};
use scout_core::{AppConfig, AppResult};
use std::path::PathBuf;
use tracing::Instrument;

/// Scout - project question answering over routed knowledge sources
#[derive(Parser, Debug)]
#[command(name = "scout")]
#[command(about = "Project question answering over routed knowledge sources", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "SCOUT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "SCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (groq, openai, ollama)
    #[arg(short, long, global = true, env = "SCOUT_PROVIDER")]
    provider: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question about a project
    Ask(AskCommand),

    /// Add a record to a knowledge source
    Ingest(IngestCommand),

    /// Show the stored turns of a conversation
    History(HistoryCommand),

    /// List the configured knowledge sources
    Sources(SourcesCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init_logging(config.log_level.as_deref(), config.no_color, format)?;

    tracing::info!("Scout CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);

    config.ensure_scout_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Ingest(_) => "ingest",
        Commands::History(_) => "history",
        Commands::Sources(_) => "sources",
    };
    let span = tracing::info_span!("command", name = command_name);

    async {
        let result = match cli.command {
            Commands::Ask(cmd) => cmd.execute(&config).await,
            Commands::Ingest(cmd) => cmd.execute(&config).await,
            Commands::History(cmd) => cmd.execute(&config).await,
            Commands::Sources(cmd) => cmd.execute(&config),
        };

        match &result {
            Ok(_) => tracing::info!("Command completed successfully"),
            Err(e) => tracing::error!("Command failed: {}", e),
        }

        result
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from([
            "scout",
            "ask",
            "What's the status of the roof repair?",
            "--project",
            "p1",
            "--conversation",
            "c1",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Ask(cmd) => {
                assert_eq!(cmd.project, "p1");
                assert_eq!(cmd.conversation, "c1");
                assert!(cmd.json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ask_requires_project() {
        assert!(Cli::try_parse_from(["scout", "ask", "hi", "--conversation", "c1"]).is_err());
    }
}
