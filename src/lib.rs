//! Warwatch - faction war tracking daemon
//!
//! Warwatch watches a faction's ranked war through a rate-limited REST API:
//! it detects the active war, polls the enemy roster on a tiered schedule,
//! and serves the live session to UI clients over a Unix socket.

pub mod api;
pub mod cli;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod detector;
pub mod domain;
pub mod error;
pub mod ipc;
pub mod poller;
pub mod scheduler;
pub mod store;

pub use error::{Result, WarwatchError};
