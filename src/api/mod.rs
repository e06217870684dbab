//! Rate-and-priority-aware client for the game's REST API.
//!
//! All requests flow through the scheduler's request queue. The `ProfileFetcher`
//! trait is the seam consumed by war detection and the poll cycle so tests can
//! substitute a scripted fetcher.

pub mod client;
pub mod key;
pub mod normalize;

pub use client::{ApiClient, ApiConfig, KeyCheck, KeyValidation, ProfileFetcher};
pub use key::KeyStore;
pub use normalize::normalize_profile;
