//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// refiner - session-driven document refinement
#[derive(Parser)]
#[command(
    name = "refiner",
    about = "Refine a vague request into a structured artifact through a clarification conversation",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Start a new session and answer its questions interactively
    Start {
        /// The request to refine
        request: String,

        /// Owner principal for the session
        #[arg(short, long, default_value = "local")]
        owner: String,
    },

    /// Resume an existing session interactively
    Resume {
        /// Session ID
        session_id: String,

        /// Owner principal for the session
        #[arg(short, long, default_value = "local")]
        owner: String,
    },

    /// Show a session's stage and pending questions
    Status {
        /// Session ID
        session_id: String,
    },

    /// Print a session's full record as JSON
    Show {
        /// Session ID
        session_id: String,
    },
}
