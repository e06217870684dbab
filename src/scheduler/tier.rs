//! Tiering policy: how urgently each target must be refreshed.
//!
//! Targets closer to becoming attackable (Okay, or about to leave hospital)
//! are refreshed most aggressively and win tie-breaks; targets in a long,
//! predictable cooldown are refreshed rarely to conserve request budget.

use crate::domain::{Target, TargetStatus};

/// Refresh intervals in seconds.
pub const INTERVAL_HOT: u64 = 30;
pub const INTERVAL_WARM: u64 = 60;
pub const INTERVAL_COLD: u64 = 120;

/// Priority ranks. Higher runs first.
pub const PRIORITY_ATTACKABLE: u8 = 5;
pub const PRIORITY_LEAVING_SOON: u8 = 4;
pub const PRIORITY_TRAVELING: u8 = 3;
pub const PRIORITY_LONG_COOLDOWN: u8 = 2;
pub const PRIORITY_BACKGROUND: u8 = 1;

/// Hospital stays under this remainder count as about to release.
const HOSPITAL_SOON_SECS: u64 = 300;
/// Hospital stays under this remainder are worth watching.
const HOSPITAL_WARM_SECS: u64 = 1800;

/// The (interval, priority) pair assigned to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    /// Seconds between refreshes at this tier.
    pub interval: u64,
    /// Rank relative to other targets; higher is fetched first.
    pub priority: u8,
}

/// Classify a target by its last-known state. Deterministic, no side effects.
pub fn tier_for_target(target: &Target, now: u64) -> Tier {
    match target.status {
        TargetStatus::Okay => Tier {
            interval: INTERVAL_HOT,
            priority: PRIORITY_ATTACKABLE,
        },
        TargetStatus::Hospital => {
            let remaining = target.hospital_remaining(now);
            if remaining < HOSPITAL_SOON_SECS {
                Tier {
                    interval: INTERVAL_HOT,
                    priority: PRIORITY_ATTACKABLE,
                }
            } else if remaining < HOSPITAL_WARM_SECS {
                Tier {
                    interval: INTERVAL_WARM,
                    priority: PRIORITY_LEAVING_SOON,
                }
            } else {
                Tier {
                    interval: INTERVAL_COLD,
                    priority: PRIORITY_LONG_COOLDOWN,
                }
            }
        }
        TargetStatus::Traveling => Tier {
            interval: INTERVAL_WARM,
            priority: PRIORITY_TRAVELING,
        },
        _ => Tier {
            interval: INTERVAL_COLD,
            priority: PRIORITY_BACKGROUND,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target_with(status: TargetStatus, hospital_until: u64) -> Target {
        Target {
            status,
            hospital_until,
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_status_is_background() {
        let tier = tier_for_target(&target_with(TargetStatus::Unknown, 0), 1000);
        assert_eq!(tier, Tier { interval: 120, priority: 1 });
    }

    #[test]
    fn test_okay_is_hottest() {
        let tier = tier_for_target(&target_with(TargetStatus::Okay, 0), 1000);
        assert_eq!(tier, Tier { interval: 30, priority: 5 });
    }

    #[test]
    fn test_hospital_release_soon() {
        let now = 10_000;
        let tier = tier_for_target(&target_with(TargetStatus::Hospital, now + 299), now);
        assert_eq!(tier, Tier { interval: 30, priority: 5 });
    }

    #[test]
    fn test_hospital_warm_band() {
        let now = 10_000;
        let tier = tier_for_target(&target_with(TargetStatus::Hospital, now + 300), now);
        assert_eq!(tier, Tier { interval: 60, priority: 4 });
        let tier = tier_for_target(&target_with(TargetStatus::Hospital, now + 1799), now);
        assert_eq!(tier, Tier { interval: 60, priority: 4 });
    }

    #[test]
    fn test_hospital_long_cooldown() {
        let now = 10_000;
        let tier = tier_for_target(&target_with(TargetStatus::Hospital, now + 1800), now);
        assert_eq!(tier, Tier { interval: 120, priority: 2 });
    }

    #[test]
    fn test_hospital_already_released_counts_as_soon() {
        // Remainder clamps to zero, which is below the soon threshold.
        let tier = tier_for_target(&target_with(TargetStatus::Hospital, 500), 10_000);
        assert_eq!(tier, Tier { interval: 30, priority: 5 });
    }

    #[test]
    fn test_traveling() {
        let tier = tier_for_target(&target_with(TargetStatus::Traveling, 0), 1000);
        assert_eq!(tier, Tier { interval: 60, priority: 3 });
    }

    #[test]
    fn test_other_statuses_are_background() {
        for status in [TargetStatus::Abroad, TargetStatus::Jail, TargetStatus::Federal] {
            let tier = tier_for_target(&target_with(status, 0), 1000);
            assert_eq!(tier, Tier { interval: 120, priority: 1 }, "{status:?}");
        }
    }
}
