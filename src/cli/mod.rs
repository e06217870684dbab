//! CLI module for warwatch - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for daemon management,
//! war status inspection, and API key handling.

pub mod commands;

pub use commands::Cli;
