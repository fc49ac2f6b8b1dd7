//! Hearth CLI — the main entry point.
//!
//! Commands:
//! - `chat`    — Interactive chat or single-message mode
//! - `analyze` — Document analysis (synthesis, hierarchical, or code loop)
//! - `hub`     — Export/import conversations as hub files
//! - `history` — Show the persisted transcript of a chat
//! - `models`  — List models available on the Ollama server

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod app;
mod commands;

#[derive(Parser)]
#[command(
    name = "hearth",
    about = "Hearth — a local assistant with document-grounded memory",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Session identifier (shares memory across runs of the same chat)
        #[arg(short, long, default_value = "default")]
        session: String,

        /// Documents to ingest before chatting
        #[arg(short, long)]
        ingest: Vec<PathBuf>,

        /// Skip model-based query enhancement before retrieval
        #[arg(long)]
        no_enhance: bool,
    },

    /// Analyze ingested documents
    Analyze {
        /// Text files to ingest for this analysis
        #[arg(short, long, required = true)]
        files: Vec<PathBuf>,

        /// The analysis question
        #[arg(short, long)]
        question: String,

        /// Use the code-generation loop instead of model-only synthesis
        #[arg(long)]
        code: bool,

        /// Hierarchical deep analysis of a single document
        #[arg(long)]
        deep: bool,
    },

    /// Export or import a conversation hub file
    Hub {
        #[command(subcommand)]
        action: commands::hub::HubAction,
    },

    /// Print the persisted transcript of a chat
    History {
        /// Chat identifier
        #[arg(short, long, default_value = "default")]
        chat: String,
    },

    /// List models available on the Ollama server
    Models,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat {
            message,
            session,
            ingest,
            no_enhance,
        } => commands::chat::run(message, session, ingest, no_enhance).await?,
        Commands::Analyze {
            files,
            question,
            code,
            deep,
        } => commands::analyze::run(files, question, code, deep).await?,
        Commands::Hub { action } => commands::hub::run(action).await?,
        Commands::History { chat } => commands::history::run(chat).await?,
        Commands::Models => commands::models::run().await?,
    }

    Ok(())
}
