//! Daemon core - the long-running process that:
//! - Detects the active war and keeps the roster current
//! - Runs the poll cycle on the configured interval
//! - Mirrors queue throttle transitions into the session
//! - Serves UI clients over the IPC socket

pub mod context;
pub mod router;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use context::DaemonContext;
pub use router::Router;

use crate::config::Config;
use crate::error::Result;
use crate::ipc::{Event, IpcServer, IpcServerConfig};

/// Default Unix socket location.
pub fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/warwatch-daemon.sock")
}

fn spawn_throttle_watcher(ctx: &Arc<DaemonContext>) {
    let mut throttle_rx = ctx.queue.throttle_rx();
    let store = Arc::clone(&ctx.store);
    let event_tx = ctx.event_tx.clone();
    tokio::spawn(async move {
        while throttle_rx.changed().await.is_ok() {
            let limited = *throttle_rx.borrow();
            match store.patch_war_session(|session| session.rate_limited = limited) {
                Ok(_) => {
                    let _ = event_tx.send(Event::WarDataUpdated);
                }
                Err(e) => tracing::warn!(error = %e, "failed to record throttle state"),
            }
        }
    });
}

fn spawn_poll_loop(ctx: Arc<DaemonContext>) {
    tokio::spawn(async move {
        loop {
            // Re-read each cycle so settings changes take effect without a
            // restart.
            let interval = match ctx.store.settings() {
                Ok(settings) => settings.poll_interval_seconds,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read settings");
                    crate::domain::settings::DEFAULT_POLL_INTERVAL_SECS
                }
            };
            tokio::time::sleep(Duration::from_secs(interval)).await;
            if let Err(e) = ctx.poller.tick().await {
                tracing::warn!(error = %e, "poll cycle failed");
            }
        }
    });
}

fn spawn_war_check_loop(ctx: Arc<DaemonContext>, interval_seconds: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(60)));
        // First tick fires immediately; startup detection already ran.
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = ctx.detector.detect_war().await {
                tracing::warn!(error = %e, "war detection sweep failed");
            }
        }
    });
}

/// Run the daemon until interrupted.
pub async fn run(config: Config) -> Result<()> {
    let ctx = Arc::new(DaemonContext::new(&config)?);

    if let Err(e) = ctx.detector.detect_war().await {
        tracing::warn!(error = %e, "startup war detection failed");
    }

    spawn_throttle_watcher(&ctx);
    spawn_poll_loop(Arc::clone(&ctx));
    spawn_war_check_loop(Arc::clone(&ctx), config.daemon.war_check_interval_seconds);

    let server_config = IpcServerConfig::default().with_socket_path(config.socket_path());
    let mut server = IpcServer::with_config(server_config).with_event_channel(ctx.event_tx.clone());
    let router = Arc::new(Router::new(Arc::clone(&ctx)));

    tokio::select! {
        result = server.run(router) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received interrupt, shutting down");
            Ok(())
        }
    }
}
