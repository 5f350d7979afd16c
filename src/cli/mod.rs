//! Command-line interface for the study tutor.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Study assistant: answers questions over your notes, builds quizzes and tracks study time.
#[derive(Debug, Parser)]
#[command(name = "tutor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve(commands::ServeArgs),

    /// Add PDF, DOCX or TXT files to the knowledge base
    Ingest(commands::IngestArgs),

    /// Ask a single question against the knowledge base
    Ask(commands::AskArgs),

    /// Show index and store status
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
