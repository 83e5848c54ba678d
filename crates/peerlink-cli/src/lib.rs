//! PeerLink CLI library
//!
//! Argument parsing, TOML configuration and the command handlers behind the
//! `peerlink` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
