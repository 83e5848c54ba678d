//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path (TOML)
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run several nodes on an in-memory network and let them chat
    Simulate {
        /// Number of nodes to start
        #[arg(short, long, default_value_t = 3)]
        peers: usize,
        /// Greetings each node sends to every connected peer
        #[arg(short, long, default_value_t = 1)]
        rounds: usize,
        /// Longest time to wait for the nodes to connect, in seconds
        #[arg(short, long, default_value_t = 5)]
        duration_secs: u64,
    },
    /// Print the effective configuration as TOML
    Config,
}
