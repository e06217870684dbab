//! Request routing - maps IPC requests to daemon operations.

use std::sync::Arc;

use crate::daemon::context::DaemonContext;
use crate::error::Result;
use crate::ipc::server::RequestHandler;
use crate::ipc::{Event, Request, Response};

/// Routes IPC requests against the daemon context.
pub struct Router {
    ctx: Arc<DaemonContext>,
}

impl Router {
    pub fn new(ctx: Arc<DaemonContext>) -> Self {
        Self { ctx }
    }

    async fn dispatch(&self, request: Request) -> Result<Response> {
        match request {
            Request::GetState => self.get_state(),
            Request::ValidateApiKey { api_key, persist } => self.validate_api_key(&api_key, persist).await,
            Request::ForceRefresh => self.force_refresh().await,
            Request::UpdateSettings { settings } => self.update_settings(&settings),
            Request::ResetData => self.reset_data(),
            // Subscription is connection state; the server intercepts it.
            Request::Subscribe => Ok(Response::Ok),
        }
    }

    fn get_state(&self) -> Result<Response> {
        Ok(Response::State {
            settings: self.ctx.store.settings()?,
            war: self.ctx.store.war_session()?,
            has_api_key: self.ctx.keys.has_key()?,
        })
    }

    async fn validate_api_key(&self, api_key: &str, persist: bool) -> Result<Response> {
        let result = self.ctx.api.validate_key(api_key).await;
        if result.ok && persist {
            self.ctx.keys.set_api_key(api_key)?;
            tracing::info!(player_id = result.player_id, "API key accepted and stored");
            // Kick off detection so the session reflects the new key.
            self.ctx.detector.detect_war().await?;
        }
        Ok(Response::KeyValidation { result })
    }

    async fn force_refresh(&self) -> Result<Response> {
        self.ctx.detector.detect_war().await?;
        self.ctx.poller.tick().await?;
        Ok(Response::Ok)
    }

    fn update_settings(&self, patch: &serde_json::Value) -> Result<Response> {
        let mut settings = self.ctx.store.settings()?.apply_patch(patch);
        settings.normalize();
        self.ctx.store.save_settings(&settings)?;
        self.ctx.broadcast(Event::SettingsUpdated);
        Ok(Response::Settings { settings })
    }

    fn reset_data(&self) -> Result<Response> {
        self.ctx.store.reset()?;
        self.ctx.keys.clear_cache();
        self.ctx.broadcast(Event::SettingsUpdated);
        self.ctx.broadcast(Event::WarDataUpdated);
        Ok(Response::Ok)
    }
}

impl RequestHandler for Router {
    fn handle(&self, request: Request) -> impl std::future::Future<Output = Response> + Send {
        async move {
            match self.dispatch(request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, "request failed");
                    Response::error(e.to_string())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use tempfile::TempDir;

    fn router() -> (TempDir, Router) {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_path_buf();
        let ctx = Arc::new(DaemonContext::new(&config).unwrap());
        (dir, Router::new(ctx))
    }

    #[tokio::test]
    async fn test_get_state_defaults() {
        let (_dir, router) = router();
        let response = router.handle(Request::GetState).await;
        match response {
            Response::State { settings, war, has_api_key } => {
                assert_eq!(settings.poll_interval_seconds, 30);
                assert!(war.targets.is_empty());
                assert!(!has_api_key);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_settings_clamps_and_persists() {
        let (_dir, router) = router();
        let response = router
            .handle(Request::UpdateSettings {
                settings: json!({"poll_interval_seconds": 45, "max_visible_targets": 100, "bogus": true}),
            })
            .await;
        match response {
            Response::Settings { settings } => {
                // 45 snaps onto the 30s grid; 100 clamps to the ceiling.
                assert_eq!(settings.poll_interval_seconds, 60);
                assert_eq!(settings.max_visible_targets, 30);
            }
            other => panic!("unexpected response: {other:?}"),
        }
        let stored = router.ctx.store.settings().unwrap();
        assert_eq!(stored.poll_interval_seconds, 60);
    }

    #[tokio::test]
    async fn test_reset_data_clears_settings() {
        let (_dir, router) = router();
        router
            .handle(Request::UpdateSettings { settings: json!({"panel_width": 400}) })
            .await;
        let response = router.handle(Request::ResetData).await;
        assert!(matches!(response, Response::Ok));
        assert_eq!(router.ctx.store.settings().unwrap().panel_width, 320);
    }
}
