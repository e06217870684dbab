//! Batch selection: which due targets to refresh this tick.
//!
//! The ordering here is load-bearing: when the budget is smaller than the
//! due set, the most urgent and most stale targets must be serviced first.

use crate::domain::Target;
use crate::scheduler::tier::{Tier, tier_for_target};

/// Minimum per-tick budget. The cycle always attempts forward progress even
/// under a tiny configured rate limit.
pub const MIN_BATCH_BUDGET: usize = 4;

/// A target selected for refresh, paired with its tier.
#[derive(Debug, Clone, PartialEq)]
pub struct DueTarget {
    pub target: Target,
    pub tier: Tier,
}

/// Maximum number of targets to refresh in one tick.
///
/// `limit_per_minute` requests spread over `60 / interval` ticks per minute,
/// with the interval clamped to at least 30 seconds and the result floored
/// at [`MIN_BATCH_BUDGET`].
pub fn batch_budget(poll_interval_seconds: u64, limit_per_minute: u32) -> usize {
    let interval = poll_interval_seconds.max(30);
    let limit = limit_per_minute.max(1) as u64;
    let budget = limit * interval / 60;
    (budget as usize).max(MIN_BATCH_BUDGET)
}

/// Select up to `budget` due targets, ordered by descending tier priority,
/// ties broken by ascending `last_polled` (staler first; never-polled is 0
/// and always wins ties).
pub fn select_due(targets: &[Target], now: u64, budget: usize) -> Vec<DueTarget> {
    let mut due: Vec<DueTarget> = targets
        .iter()
        .map(|t| DueTarget {
            tier: tier_for_target(t, now),
            target: t.clone(),
        })
        .filter(|d| d.target.never_polled() || now.saturating_sub(d.target.last_polled) >= d.tier.interval)
        .collect();

    due.sort_by(|a, b| {
        b.tier
            .priority
            .cmp(&a.tier.priority)
            .then(a.target.last_polled.cmp(&b.target.last_polled))
    });
    due.truncate(budget);
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TargetStatus;

    fn target(id: u64, status: TargetStatus, last_polled: u64) -> Target {
        Target {
            id,
            status,
            last_polled,
            ..Target::unknown(id, format!("t{id}"))
        }
    }

    #[test]
    fn test_budget_formula() {
        assert_eq!(batch_budget(30, 90), 45);
        assert_eq!(batch_budget(60, 90), 90);
        // Interval below 30 is clamped to 30
        assert_eq!(batch_budget(10, 90), 45);
        // Tiny limits still floor at 4
        assert_eq!(batch_budget(30, 3), 4);
        assert_eq!(batch_budget(30, 0), 4);
        assert_eq!(batch_budget(120, 90), 180);
    }

    #[test]
    fn test_select_orders_by_priority_then_staleness() {
        let now = 1000;
        let targets = vec![
            target(1, TargetStatus::Okay, 900),      // priority 5
            target(2, TargetStatus::Traveling, 800), // priority 3
            target(3, TargetStatus::Jail, 100),      // priority 1
        ];
        let selected = select_due(&targets, now, 2);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].target.id, 1);
        assert_eq!(selected[0].tier.priority, 5);
        assert_eq!(selected[1].target.id, 2);
        assert_eq!(selected[1].tier.priority, 3);
    }

    #[test]
    fn test_not_due_targets_filtered() {
        let now = 1000;
        // Okay tier interval is 30s; polled 10s ago, not due.
        let targets = vec![target(1, TargetStatus::Okay, now - 10)];
        assert!(select_due(&targets, now, 10).is_empty());

        // Exactly at the interval counts as due.
        let targets = vec![target(2, TargetStatus::Okay, now - 30)];
        assert_eq!(select_due(&targets, now, 10).len(), 1);
    }

    #[test]
    fn test_never_polled_always_due_and_wins_ties() {
        let now = 10_000;
        let targets = vec![
            target(1, TargetStatus::Okay, now - 40),
            target(2, TargetStatus::Okay, 0), // never polled
        ];
        let selected = select_due(&targets, now, 10);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].target.id, 2);
        assert_eq!(selected[1].target.id, 1);
    }

    #[test]
    fn test_staleness_breaks_priority_ties() {
        let now = 10_000;
        let targets = vec![
            target(1, TargetStatus::Okay, now - 31),
            target(2, TargetStatus::Okay, now - 90),
            target(3, TargetStatus::Okay, now - 60),
        ];
        let ids: Vec<u64> = select_due(&targets, now, 10)
            .into_iter()
            .map(|d| d.target.id)
            .collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_budget_truncates_after_ordering() {
        let now = 120_000;
        // Tiers 5, 5, 4, 3, 1 — all due (never polled or long stale).
        let targets = vec![
            target(1, TargetStatus::Jail, 100),
            target(2, TargetStatus::Okay, 200),
            target(3, TargetStatus::Traveling, 300),
            target(4, TargetStatus::Okay, 100),
            Target {
                id: 5,
                status: TargetStatus::Hospital,
                hospital_until: now + 600, // warm band, priority 4
                last_polled: 400,
                ..Default::default()
            },
        ];
        let selected = select_due(&targets, now, 3);
        let ids: Vec<u64> = selected.iter().map(|d| d.target.id).collect();
        // Two priority-5 targets (stalest first), then the priority-4.
        assert_eq!(ids, vec![4, 2, 5]);
    }

    #[test]
    fn test_empty_roster() {
        assert!(select_due(&[], 1000, 5).is_empty());
    }
}
