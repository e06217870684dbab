//! War detection: derives the WarSession wholesale.
//!
//! Runs at startup, on a slow interval, and after a key change. Walks from
//! the operator's own profile to their faction, finds the enemy faction, and
//! rebuilds the tracked roster — preserving previously polled per-target
//! fields so a detection cycle never discards live data.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use crate::api::{KeyStore, ProfileFetcher};
use crate::clock::Clock;
use crate::domain::{Target, WarSession, WarStatus};
use crate::error::Result;
use crate::ipc::Event;
use crate::store::Store;

/// A faction reference extracted from an upstream payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactionRef {
    pub id: u64,
    pub name: Option<String>,
}

fn int_at(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| {
        value
            .get(*k)
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .filter(|id| *id > 0)
    })
}

fn str_at(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(String::from)
}

/// Extract the operator's own faction from their user profile.
pub fn own_faction_from_user(user: &Value) -> Option<FactionRef> {
    let faction = user.get("faction")?;
    let id = int_at(faction, &["faction_id", "id"])?;
    Some(FactionRef {
        id,
        name: str_at(faction, &["faction_name", "name"]),
    })
}

/// Find the enemy faction in a faction-basic payload. Prefers the ranked-war
/// block's direct id; falls back to scanning the wars list.
pub fn enemy_from_faction_basic(faction: &Value) -> Option<FactionRef> {
    let ranked = faction
        .get("ranked_war")
        .or_else(|| faction.get("rankedwar"))
        .cloned()
        .unwrap_or(Value::Null);
    let direct = int_at(&ranked, &["enemy", "enemy_id"])
        .or_else(|| int_at(faction, &["enemy_faction_id", "enemy_faction"]));
    if let Some(id) = direct {
        return Some(FactionRef {
            id,
            name: str_at(&ranked, &["enemy_name"]).or_else(|| str_at(faction, &["enemy_faction_name"])),
        });
    }

    let wars = faction.get("wars").or_else(|| faction.get("war"))?;
    let nodes: Vec<&Value> = match wars {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    };
    for war in nodes {
        let opponent = war.get("opponent").or_else(|| war.get("enemy")).cloned().unwrap_or(Value::Null);
        let id = int_at(&opponent, &["id", "faction_id"]).or_else(|| int_at(war, &["enemy_id"]));
        if let Some(id) = id {
            return Some(FactionRef {
                id,
                name: str_at(&opponent, &["name"]).or_else(|| str_at(war, &["enemy_name"])),
            });
        }
    }
    None
}

/// Extract the member roster from a faction-basic payload. Handles both the
/// keyed-object and array shapes the API has used.
pub fn members_from_faction_basic(faction: &Value) -> Vec<(u64, String)> {
    let raw = faction
        .get("members")
        .or_else(|| faction.get("members_list"))
        .cloned()
        .unwrap_or(Value::Null);

    let rows: Vec<(Option<u64>, Value)> = match raw {
        Value::Array(items) => items.into_iter().map(|v| (None, v)).collect(),
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| (k.parse::<u64>().ok(), v))
            .collect(),
        _ => Vec::new(),
    };

    rows.into_iter()
        .filter_map(|(key_id, row)| {
            let id = int_at(&row, &["id", "player_id"]).or(key_id)?;
            let name = str_at(&row, &["name", "player_name"]).unwrap_or_else(|| format!("Player {id}"));
            Some((id, name))
        })
        .collect()
}

/// War detection driver.
pub struct WarDetector {
    fetcher: Arc<dyn ProfileFetcher>,
    store: Arc<Store>,
    keys: Arc<KeyStore>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<Event>,
}

impl WarDetector {
    pub fn new(
        fetcher: Arc<dyn ProfileFetcher>,
        store: Arc<Store>,
        keys: Arc<KeyStore>,
        clock: Arc<dyn Clock>,
        events: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            fetcher,
            store,
            keys,
            clock,
            events,
        }
    }

    /// Re-derive the WarSession. Fetch failures land in the session as
    /// `status = Error` rather than propagating; only storage failures
    /// return `Err`.
    pub async fn detect_war(&self) -> Result<WarSession> {
        if self.keys.api_key()?.is_none() {
            let session = WarSession {
                status: WarStatus::MissingKey,
                poll_countdown_seconds: self.store.settings()?.poll_interval_seconds,
                ..Default::default()
            };
            self.store.save_war_session(&session)?;
            self.broadcast();
            return Ok(session);
        }

        match self.try_detect().await {
            Ok(session) => Ok(session),
            Err(e) => {
                tracing::warn!(error = %e, "war detection failed");
                let now = self.clock.now_secs();
                let session = self.store.patch_war_session(|session| {
                    session.status = WarStatus::Error;
                    session.error_message = Some(e.to_string());
                    session.last_updated = now;
                })?;
                self.broadcast();
                Ok(session)
            }
        }
    }

    async fn try_detect(&self) -> Result<WarSession> {
        let now = self.clock.now_secs();

        let own_user = self.fetcher.fetch_own().await?;
        let Some(own) = own_faction_from_user(&own_user) else {
            let session = self.store.patch_war_session(|session| {
                session.status = WarStatus::NoFaction;
                session.targets.clear();
                session.error_message = None;
                session.last_updated = now;
            })?;
            self.broadcast();
            return Ok(session);
        };

        let own_basic = self.fetcher.fetch_faction_basic(Some(own.id)).await?;
        let Some(enemy) = enemy_from_faction_basic(&own_basic) else {
            let session = self.store.patch_war_session(|session| {
                session.status = WarStatus::NoActiveWar;
                session.own_faction_id = Some(own.id);
                session.own_faction_name = own.name.clone();
                session.enemy_faction_id = None;
                session.enemy_faction_name = None;
                session.targets.clear();
                session.error_message = None;
                session.last_updated = now;
            })?;
            self.broadcast();
            return Ok(session);
        };

        let enemy_basic = self.fetcher.fetch_faction_basic(Some(enemy.id)).await?;
        let members = members_from_faction_basic(&enemy_basic);
        tracing::info!(
            enemy_faction = enemy.id,
            members = members.len(),
            "active war detected"
        );

        let previous = self.store.war_session()?;
        let settings = self.store.settings()?;
        let mut session = WarSession {
            status: WarStatus::ActiveWar,
            own_faction_id: Some(own.id),
            own_faction_name: own.name,
            enemy_faction_id: Some(enemy.id),
            enemy_faction_name: enemy.name.or_else(|| Some(format!("Faction {}", enemy.id))),
            last_updated: now,
            poll_countdown_seconds: settings.poll_interval_seconds,
            rate_limited: false,
            ..Default::default()
        };
        // Members absent from the new roster are dropped; members already
        // tracked keep their previously polled fields.
        for (id, name) in members {
            let target = match previous.targets.get(&id) {
                Some(prior) => Target {
                    name: name.clone(),
                    ..prior.clone()
                },
                None => Target::unknown(id, name),
            };
            session.targets.insert(id, target);
        }

        self.store.save_war_session(&session)?;
        self.broadcast();
        Ok(session)
    }

    fn broadcast(&self) {
        // No subscriber is fine.
        let _ = self.events.send(Event::WarDataUpdated);
    }
}
