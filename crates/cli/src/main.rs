//! sandloop CLI — the main entry point.
//!
//! Commands:
//! - `ask`      — Run one agent turn against a session
//! - `history`  — Dump a session's message log
//! - `sessions` — List a user's sessions
//! - `clear`    — Drop a session's log and definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "sandloop",
    about = "sandloop — a sandboxed coding-agent runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (defaults to ~/.sandloop/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one agent turn
    Ask {
        /// The query to solve
        query: String,

        /// User id the session belongs to
        #[arg(short, long, default_value = "local")]
        user: String,

        /// Session id (a new session is created when omitted)
        #[arg(short, long)]
        session: Option<String>,

        /// Image file(s) to attach
        #[arg(long)]
        image: Vec<PathBuf>,

        /// CSV file to hand to the agent
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Dump a session's message log
    History {
        #[arg(short, long, default_value = "local")]
        user: String,

        #[arg(short, long)]
        session: String,

        /// Include intermediate reasoning messages
        #[arg(long)]
        reasoning: bool,
    },

    /// List a user's sessions
    Sessions {
        #[arg(short, long, default_value = "local")]
        user: String,
    },

    /// Drop a session's log and definitions
    Clear {
        #[arg(short, long, default_value = "local")]
        user: String,

        #[arg(short, long)]
        session: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli
        .config
        .unwrap_or_else(sandloop_config::AppConfig::default_path);
    let config = sandloop_config::AppConfig::load(&config_path)?;

    match cli.command {
        Commands::Ask {
            query,
            user,
            session,
            image,
            csv,
        } => commands::ask::run(&config, &user, session, query, image, csv).await?,
        Commands::History {
            user,
            session,
            reasoning,
        } => commands::history::run(&config, &user, &session, reasoning).await?,
        Commands::Sessions { user } => commands::sessions::run(&config, &user).await?,
        Commands::Clear { user, session } => {
            commands::clear::run(&config, &user, &session).await?
        }
    }

    Ok(())
}
