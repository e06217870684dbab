//! Daemon context - shared state for request handlers
//!
//! DaemonContext owns all the components the daemon operates on: the state
//! store, API key cache, request queue, API client, war detector, poll
//! cycle, and the event channel to subscribed clients.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::api::{ApiClient, ApiConfig, KeyStore, ProfileFetcher};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::detector::WarDetector;
use crate::error::Result;
use crate::ipc::Event;
use crate::poller::PollCycle;
use crate::scheduler::{QueueHandle, RequestQueue};
use crate::store::Store;

/// Shared context for all daemon request handlers
pub struct DaemonContext {
    pub store: Arc<Store>,
    pub keys: Arc<KeyStore>,
    pub queue: QueueHandle,
    pub api: Arc<ApiClient>,
    pub detector: WarDetector,
    pub poller: PollCycle,
    /// Event broadcasting to subscribed clients
    pub event_tx: broadcast::Sender<Event>,
}

impl DaemonContext {
    /// Create a new DaemonContext with all components initialized
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = Arc::new(Store::open(&config.storage.data_dir)?);
        let keys = Arc::new(KeyStore::new(Arc::clone(&store)));
        let queue = RequestQueue::new(config.api.rate_limit_per_minute as usize, Arc::clone(&clock));
        let api = Arc::new(ApiClient::new(
            ApiConfig {
                base_url: config.api.base_url.clone(),
                timeout: std::time::Duration::from_millis(config.api.timeout_ms),
            },
            Arc::clone(&queue),
            Arc::clone(&keys),
        )?);

        let (event_tx, _) = broadcast::channel(256);

        let fetcher: Arc<dyn ProfileFetcher> = api.clone();
        let detector = WarDetector::new(
            Arc::clone(&fetcher),
            Arc::clone(&store),
            Arc::clone(&keys),
            Arc::clone(&clock),
            event_tx.clone(),
        );
        let poller = PollCycle::new(
            fetcher,
            Arc::clone(&store),
            Arc::clone(&clock),
            event_tx.clone(),
            config.api.rate_limit_per_minute,
        );

        Ok(Self {
            store,
            keys,
            queue,
            api,
            detector,
            poller,
            event_tx,
        })
    }

    /// Broadcast an event to all connected clients
    pub fn broadcast(&self, event: Event) {
        // Ignore send errors (no subscribers is fine)
        let _ = self.event_tx.send(event);
    }

    /// Get a receiver for events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }
}
