//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - daemon: start/status for daemon management
//! - status: show the current war session
//! - refresh: force an immediate detection and poll cycle
//! - key: set or validate the API key
//! - settings: patch persisted settings
//! - reset: clear all persisted state

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Warwatch - faction war tracking daemon
#[derive(Parser, Debug)]
#[command(name = "warwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Daemon management commands
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },

    /// Show the current war session
    Status {
        /// Show every tracked target, not just the attackable ones
        #[arg(short, long)]
        all: bool,
    },

    /// Force war detection and a poll cycle now
    Refresh,

    /// API key management
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Merge a JSON settings patch
    Settings {
        /// Patch object, e.g. '{"poll_interval_seconds": 60}'
        patch: String,
    },

    /// Clear all persisted state
    Reset,
}

/// Daemon management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum DaemonCommands {
    /// Run the daemon in the foreground
    Start,

    /// Check whether the daemon is reachable
    Status,
}

/// API key subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum KeyCommands {
    /// Validate a key and store it on success
    Set {
        /// The API key
        key: String,
    },

    /// Validate a key without storing it
    Validate {
        /// The API key
        key: String,
    },
}
