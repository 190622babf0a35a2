//! ELIZA CLI, the main entry point.
//!
//! Commands:
//! - `onboard`   Write the default config and session directory
//! - `chat`      Interactive or single-message conversation
//! - `gateway`   Start the chat-completion HTTP server
//! - `check`     Load the rule set and report on it
//! - `sweep`     Expire idle sessions once
//! - `status`    Show configuration and stored sessions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "eliza",
    about = "ELIZA: keyword-ranked pattern responder with a chat-completion API",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration
    Onboard,

    /// Talk to ELIZA in the terminal
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Resume (and keep saving) a stored session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Load the configured rules and report on them
    Check {
        /// Use this classic script instead of the configured one
        #[arg(long)]
        script: Option<PathBuf>,

        /// Merge an extra TOML rule pack (repeatable)
        #[arg(long = "pack")]
        packs: Vec<PathBuf>,

        /// Answer a sample utterance (repeatable, shares one conversation)
        #[arg(long)]
        say: Vec<String>,
    },

    /// Delete sessions idle longer than the configured age
    Sweep {
        /// Override `sessions.max_age_hours`
        #[arg(long)]
        max_age_hours: Option<u64>,
    },

    /// Show configuration and stored sessions
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init(),
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat { message, session } => commands::chat::run(message, session).await?,
        Commands::Gateway { port } => commands::gateway::run(port).await?,
        Commands::Check { script, packs, say } => commands::check::run(script, packs, say).await?,
        Commands::Sweep { max_age_hours } => commands::sweep::run(max_age_hours).await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
