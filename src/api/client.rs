//! HTTP client for the game API.
//!
//! Every fetch is enqueued on the shared request queue with a priority hint,
//! so the rate window governs all traffic regardless of caller. Error
//! messages are redacted before they can leak the API key into logs or UI.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::key::KeyStore;
use crate::error::{Result, WarwatchError};
use crate::scheduler::QueueHandle;

/// Priorities for the fixed request kinds. User-profile fetches carry the
/// target's tier priority instead.
pub const PRIORITY_OWN_PROFILE: u8 = 5;
pub const PRIORITY_FACTION: u8 = 4;
pub const PRIORITY_VALIDATION: u8 = 10;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.torn.com".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Fetch operations required by war detection and the poll cycle.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    /// Fetch the operator's own profile. Tries selections `profile,basic`
    /// first and falls back to `basic` for keys without profile access.
    async fn fetch_own(&self) -> Result<Value>;

    /// Fetch basic faction data; `None` means the key owner's own faction.
    async fn fetch_faction_basic(&self, id: Option<u64>) -> Result<Value>;

    /// Fetch one user profile at the given queue priority.
    async fn fetch_user_profile(&self, id: u64, priority: u8) -> Result<Value>;
}

/// Result of probing a candidate API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValidation {
    pub ok: bool,
    pub message: String,
    #[serde(default)]
    pub access_level: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub player_id: u64,
    #[serde(default)]
    pub checks: Vec<KeyCheck>,
}

/// One endpoint capability probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyCheck {
    pub name: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Validate an API path: `user`, `faction`, or `faction/123` shapes only.
pub fn normalize_api_path(path: &str) -> Result<String> {
    let raw = path.trim_matches('/');
    let mut segments = raw.split('/');
    let head = segments.next().unwrap_or("");
    let tail = segments.next();
    let valid = !head.is_empty()
        && head.chars().all(|c| c.is_ascii_alphabetic())
        && segments.next().is_none()
        && tail.is_none_or(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()));
    if !valid {
        return Err(WarwatchError::InvalidRequest(format!("Invalid API path: {raw}")));
    }
    Ok(raw.to_string())
}

/// Replace every occurrence of the secret (raw and percent-encoded) in a
/// message before it reaches logs or callers.
pub fn redact_secret(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    let mut out = text.replace(secret, "[REDACTED]");
    let encoded = percent_encode(secret);
    if encoded != secret {
        out = out.replace(&encoded, "[REDACTED]");
    }
    out
}

fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Build the request URL with selections and key query parameters.
pub fn build_api_url(base: &str, path: &str, selections: &str, key: &str) -> Result<Url> {
    let safe_path = normalize_api_path(path)?;
    let mut url = Url::parse(&format!("{base}/{safe_path}/"))
        .map_err(|e| WarwatchError::InvalidRequest(format!("Invalid API URL: {e}")))?;
    {
        let mut pairs = url.query_pairs_mut();
        if !selections.is_empty() {
            pairs.append_pair("selections", selections);
        }
        if !key.is_empty() {
            pairs.append_pair("key", key);
        }
    }
    Ok(url)
}

/// Extract the API's error envelope, if present.
pub fn api_error_message(data: &Value) -> Option<String> {
    let error = data.get("error")?;
    if error.is_null() {
        return None;
    }
    if let Some(message) = error.get("error").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    let code = error
        .get("code")
        .and_then(Value::as_u64)
        .map(|c| c.to_string())
        .unwrap_or_default();
    Some(format!("API error {code}").trim().to_string())
}

/// Queue-routed API client.
pub struct ApiClient {
    config: ApiConfig,
    http: reqwest::Client,
    queue: QueueHandle,
    keys: Arc<KeyStore>,
}

impl ApiClient {
    pub fn new(config: ApiConfig, queue: QueueHandle, keys: Arc<KeyStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WarwatchError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            config,
            http,
            queue,
            keys,
        })
    }

    /// Issue one fetch through the queue. `key_override` is used by key
    /// validation, which probes a candidate key before persisting it.
    pub async fn api_fetch(
        &self,
        path: &str,
        selections: &str,
        priority: u8,
        key_override: Option<&str>,
    ) -> Result<Value> {
        let key = match key_override {
            Some(k) => k.to_string(),
            None => self
                .keys
                .api_key()?
                .ok_or_else(|| WarwatchError::Configuration("API key not configured".to_string()))?,
        };
        let url = build_api_url(&self.config.base_url, path, selections, &key)?;
        let http = self.http.clone();

        let outcome = self
            .queue
            .enqueue(priority, async move { fetch_and_parse(http, url).await })
            .await;
        outcome.map_err(|e| redact_error(e, &key))
    }

    /// Probe a candidate key: a basic user fetch must succeed; profile and
    /// faction access are reported as capability checks.
    pub async fn validate_key(&self, candidate: &str) -> KeyValidation {
        let key = candidate.trim();
        if key.is_empty() {
            return KeyValidation {
                ok: false,
                message: "API key is required".to_string(),
                access_level: 0,
                name: None,
                player_id: 0,
                checks: Vec::new(),
            };
        }

        let basic = match self.api_fetch("user", "basic", PRIORITY_VALIDATION, Some(key)).await {
            Ok(data) => data,
            Err(e) => {
                return KeyValidation {
                    ok: false,
                    message: e.to_string(),
                    access_level: 0,
                    name: None,
                    player_id: 0,
                    checks: Vec::new(),
                };
            }
        };
        let mut checks = vec![KeyCheck {
            name: "user.basic".to_string(),
            ok: true,
            message: None,
        }];

        let profile = self.api_fetch("user", "profile", PRIORITY_VALIDATION, Some(key)).await;
        checks.push(match &profile {
            Ok(_) => KeyCheck {
                name: "user.profile".to_string(),
                ok: true,
                message: None,
            },
            Err(e) => KeyCheck {
                name: "user.profile".to_string(),
                ok: false,
                message: Some(e.to_string()),
            },
        });

        // Prefer the own-faction endpoint; fall back to an explicit faction
        // id gleaned from either profile payload.
        let mut faction_err = None;
        let mut faction_ok = match self.api_fetch("faction", "basic", PRIORITY_VALIDATION, Some(key)).await {
            Ok(_) => true,
            Err(e) => {
                faction_err = Some(e.to_string());
                false
            }
        };
        let faction_id = faction_id_from(&basic).or_else(|| profile.as_ref().ok().and_then(faction_id_from));
        if !faction_ok && let Some(id) = faction_id {
            match self
                .api_fetch(&format!("faction/{id}"), "basic", PRIORITY_VALIDATION, Some(key))
                .await
            {
                Ok(_) => faction_ok = true,
                Err(e) => faction_err = Some(e.to_string()),
            }
        }
        checks.push(KeyCheck {
            name: "faction.basic".to_string(),
            ok: faction_ok,
            message: if faction_ok {
                None
            } else if faction_id.is_some() {
                faction_err
            } else {
                Some(
                    faction_err.unwrap_or_else(|| "No faction on account to verify".to_string()),
                )
            },
        });

        KeyValidation {
            ok: true,
            message: "API key validated".to_string(),
            access_level: basic
                .pointer("/api/access")
                .or_else(|| basic.get("api_access_level"))
                .and_then(Value::as_u64)
                .unwrap_or(0),
            name: basic.get("name").and_then(Value::as_str).map(String::from),
            player_id: basic.get("player_id").and_then(Value::as_u64).unwrap_or(0),
            checks,
        }
    }
}

fn faction_id_from(data: &Value) -> Option<u64> {
    data.pointer("/faction/faction_id")
        .or_else(|| data.pointer("/faction/id"))
        .and_then(Value::as_u64)
        .filter(|id| *id > 0)
}

async fn fetch_and_parse(http: reqwest::Client, url: Url) -> Result<Value> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| WarwatchError::Transport(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(WarwatchError::Transport(format!("HTTP {}", status.as_u16())));
    }
    let data: Value = response
        .json()
        .await
        .map_err(|e| WarwatchError::Transport(e.to_string()))?;
    if let Some(message) = api_error_message(&data) {
        return Err(WarwatchError::Api(message));
    }
    Ok(data)
}

fn redact_error(err: WarwatchError, key: &str) -> WarwatchError {
    match err {
        WarwatchError::Transport(m) => WarwatchError::Transport(redact_secret(&m, key)),
        WarwatchError::Api(m) => WarwatchError::Api(redact_secret(&m, key)),
        WarwatchError::InvalidRequest(m) => WarwatchError::InvalidRequest(redact_secret(&m, key)),
        other => other,
    }
}

#[async_trait]
impl ProfileFetcher for ApiClient {
    async fn fetch_own(&self) -> Result<Value> {
        match self.api_fetch("user", "profile,basic", PRIORITY_OWN_PROFILE, None).await {
            Ok(data) => Ok(data),
            Err(_) => self.api_fetch("user", "basic", PRIORITY_OWN_PROFILE, None).await,
        }
    }

    async fn fetch_faction_basic(&self, id: Option<u64>) -> Result<Value> {
        let path = match id {
            Some(id) => format!("faction/{id}"),
            None => "faction".to_string(),
        };
        self.api_fetch(&path, "basic", PRIORITY_FACTION, None).await
    }

    async fn fetch_user_profile(&self, id: u64, priority: u8) -> Result<Value> {
        self.api_fetch(&format!("user/{id}"), "profile", priority, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_api_path_accepts_valid() {
        assert_eq!(normalize_api_path("user").unwrap(), "user");
        assert_eq!(normalize_api_path("/faction/").unwrap(), "faction");
        assert_eq!(normalize_api_path("faction/12345").unwrap(), "faction/12345");
        assert_eq!(normalize_api_path("user/1").unwrap(), "user/1");
    }

    #[test]
    fn test_normalize_api_path_rejects_invalid() {
        for bad in ["", "user/abc", "user/1/2", "us er", "user?x=1", "faction/", "../etc"] {
            assert!(normalize_api_path(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_build_api_url() {
        let url = build_api_url("https://api.torn.com", "user/99", "profile", "SECRET").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.torn.com/user/99/?selections=profile&key=SECRET"
        );
    }

    #[test]
    fn test_build_api_url_omits_empty_params() {
        let url = build_api_url("https://api.torn.com", "faction", "", "").unwrap();
        assert_eq!(url.as_str(), "https://api.torn.com/faction/?");
    }

    #[test]
    fn test_redact_secret() {
        let redacted = redact_secret("request to ?key=SECRET123 failed", "SECRET123");
        assert_eq!(redacted, "request to ?key=[REDACTED] failed");
    }

    #[test]
    fn test_redact_secret_encoded_form() {
        let redacted = redact_secret("url had k%2By inside", "k+y");
        assert_eq!(redacted, "url had [REDACTED] inside");
    }

    #[test]
    fn test_redact_empty_secret_is_noop() {
        assert_eq!(redact_secret("nothing", ""), "nothing");
    }

    #[test]
    fn test_api_error_message_envelope() {
        let data = json!({"error": {"code": 2, "error": "Incorrect key"}});
        assert_eq!(api_error_message(&data).as_deref(), Some("Incorrect key"));

        let data = json!({"error": {"code": 9}});
        assert_eq!(api_error_message(&data).as_deref(), Some("API error 9"));

        let data = json!({"name": "fine"});
        assert_eq!(api_error_message(&data), None);
    }
}
