//! The per-interval poll cycle.
//!
//! Each tick selects the due slice of the enemy roster under the batch
//! budget, fetches those profiles concurrently through the request queue,
//! merges the results back into the stored WarSession, and notifies
//! subscribers. Outside of an active war a tick does nothing at all.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::broadcast;

use crate::api::{ProfileFetcher, normalize_profile};
use crate::clock::Clock;
use crate::domain::Target;
use crate::error::Result;
use crate::ipc::Event;
use crate::scheduler::{batch_budget, select_due};
use crate::store::Store;

/// Drives one roster refresh per poll interval.
pub struct PollCycle {
    fetcher: Arc<dyn ProfileFetcher>,
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<Event>,
    rate_limit_per_minute: u32,
}

impl PollCycle {
    pub fn new(
        fetcher: Arc<dyn ProfileFetcher>,
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        events: broadcast::Sender<Event>,
        rate_limit_per_minute: u32,
    ) -> Self {
        Self {
            fetcher,
            store,
            clock,
            events,
            rate_limit_per_minute,
        }
    }

    /// Run one poll cycle. No-op unless the stored session reports an
    /// active war with a non-empty roster.
    pub async fn tick(&self) -> Result<()> {
        let session = self.store.war_session()?;
        if !session.is_active() || session.targets.is_empty() {
            return Ok(());
        }

        let settings = self.store.settings()?;
        let now = self.clock.now_secs();
        let budget = batch_budget(settings.poll_interval_seconds, self.rate_limit_per_minute);
        let roster: Vec<Target> = session.targets.values().cloned().collect();
        let due = select_due(&roster, now, budget);
        tracing::debug!(due = due.len(), budget, roster = roster.len(), "poll tick");

        let fetches = due.iter().map(|d| {
            let fetcher = Arc::clone(&self.fetcher);
            let id = d.target.id;
            let priority = d.tier.priority;
            async move { (id, fetcher.fetch_user_profile(id, priority).await) }
        });
        let outcomes = join_all(fetches).await;

        self.store.patch_war_session(|session| {
            for (id, outcome) in outcomes {
                // Detection may have rebuilt the roster mid-flight; never
                // resurrect a target it dropped.
                let Some(existing) = session.targets.get_mut(&id) else {
                    continue;
                };
                match outcome {
                    Ok(raw) => {
                        let mut fresh = normalize_profile(id, &raw);
                        fresh.last_polled = now;
                        if fresh.name == "Unknown" {
                            fresh.name = existing.name.clone();
                        }
                        *existing = fresh;
                    }
                    Err(e) => {
                        existing.last_polled = now;
                        existing.error = Some(e.to_string());
                    }
                }
            }
            session.last_updated = now;
            session.poll_countdown_seconds = settings.poll_interval_seconds;
        })?;

        let _ = self.events.send(Event::WarDataUpdated);
        Ok(())
    }
}
