//! Domain model: tracked targets, the war session, and runtime settings.

pub mod settings;
pub mod target;
pub mod war;

pub use settings::Settings;
pub use target::{Target, TargetStatus, parse_relative_last_action};
pub use war::{WarSession, WarStatus};
