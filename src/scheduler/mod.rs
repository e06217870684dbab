//! Polling scheduler and rate-limit governor.
//!
//! This module decides, every tick, which tracked targets to refresh and in
//! what order, under a hard external request budget:
//! - **Rate window**: trailing-60-second ledger enforcing the per-minute
//!   request ceiling.
//! - **Tiering policy**: maps a target's last-known state to a refresh
//!   interval and a priority rank.
//! - **Batch selection**: filters due targets, orders by priority then
//!   staleness, truncates to the per-tick budget.
//! - **Request queue**: drains pending fetches one at a time in priority
//!   order, backing off while the window is full.

pub mod queue;
pub mod rate_window;
pub mod select;
pub mod tier;

pub use queue::{QueueHandle, RequestQueue};
pub use rate_window::{RATE_WINDOW_MS, RateWindow, can_admit, prune};
pub use select::{DueTarget, batch_budget, select_due};
pub use tier::{Tier, tier_for_target};
