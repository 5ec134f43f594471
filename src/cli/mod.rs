//! Command-line entry points

pub mod serve;

use clap::{Parser, Subcommand};

/// PromptDeck - prompt management and workflow automation backend
#[derive(Parser)]
#[command(name = "promptdeck")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve,
}
