//! Priority request queue gated by the rate window.
//!
//! All outbound API calls flow through one queue. A single drain task is
//! active at any time: it re-sorts pending requests by descending priority
//! (insertion order breaks ties), checks rate-window admission, and either
//! executes the best request or backs off without dequeuing anything.
//! Failure of one operation never halts the drain of subsequent operations.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{oneshot, watch};

use crate::clock::Clock;
use crate::error::{Result, WarwatchError};
use crate::scheduler::rate_window::RateWindow;

/// Fixed backoff between admission re-checks while throttled.
pub const THROTTLE_BACKOFF: Duration = Duration::from_millis(1000);

type Operation = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// Shared handle to the process-wide request queue.
pub type QueueHandle = Arc<RequestQueue>;

/// A pending unit of work: consumed exactly once, in priority order.
struct QueuedRequest {
    seq: u64,
    priority: u8,
    op: Operation,
    done: oneshot::Sender<Result<Value>>,
}

#[derive(Default)]
struct QueueState {
    pending: Vec<QueuedRequest>,
    next_seq: u64,
    draining: bool,
}

/// In-process priority queue of pending API operations.
pub struct RequestQueue {
    state: Mutex<QueueState>,
    window: Mutex<RateWindow>,
    throttle_tx: watch::Sender<bool>,
    clock: Arc<dyn Clock>,
    backoff: Duration,
}

impl RequestQueue {
    /// Create a queue enforcing `limit_per_minute` against the given clock.
    pub fn new(limit_per_minute: usize, clock: Arc<dyn Clock>) -> Arc<Self> {
        Self::with_backoff(limit_per_minute, clock, THROTTLE_BACKOFF)
    }

    /// As [`RequestQueue::new`] with a custom backoff interval (tests).
    pub fn with_backoff(limit_per_minute: usize, clock: Arc<dyn Clock>, backoff: Duration) -> Arc<Self> {
        let (throttle_tx, _) = watch::channel(false);
        Arc::new(Self {
            state: Mutex::new(QueueState::default()),
            window: Mutex::new(RateWindow::new(limit_per_minute)),
            throttle_tx,
            clock,
            backoff,
        })
    }

    /// Subscribe to rate-limited transitions. A value is emitted on every
    /// transition, in both directions.
    pub fn throttle_rx(&self) -> watch::Receiver<bool> {
        self.throttle_tx.subscribe()
    }

    /// Whether the queue is currently blocked by the rate window.
    pub fn is_throttled(&self) -> bool {
        *self.throttle_tx.borrow()
    }

    /// Number of requests waiting to run.
    pub fn pending_len(&self) -> usize {
        self.state.lock().expect("queue state poisoned").pending.len()
    }

    /// Enqueue an operation at the given priority and await its result.
    ///
    /// Starts the drain task if none is active; re-entrant enqueues are
    /// observed by the running drain without spawning a second one.
    pub async fn enqueue<F>(self: &Arc<Self>, priority: u8, op: F) -> Result<Value>
    where
        F: Future<Output = Result<Value>> + Send + 'static,
    {
        let (done, rx) = oneshot::channel();
        {
            let mut state = self.state.lock().expect("queue state poisoned");
            let seq = state.next_seq;
            state.next_seq += 1;
            state.pending.push(QueuedRequest {
                seq,
                priority,
                op: Box::pin(op),
                done,
            });
            if !state.draining {
                state.draining = true;
                let queue = Arc::clone(self);
                tokio::spawn(async move { queue.drain().await });
            }
        }

        rx.await
            .unwrap_or_else(|_| Err(WarwatchError::Transport("request queue dropped".to_string())))
    }

    /// Drain loop: runs until the pending list is empty, then exits.
    async fn drain(self: Arc<Self>) {
        loop {
            let next = self.admit_next();
            match next {
                Admission::Done => return,
                Admission::Throttled => {
                    tokio::time::sleep(self.backoff).await;
                }
                Admission::Run(request) => {
                    let result = request.op.await;
                    if let Err(ref e) = result {
                        tracing::debug!(priority = request.priority, error = %e, "queued request failed");
                    }
                    // Caller may have given up waiting; that is not an error.
                    let _ = request.done.send(result);
                }
            }
        }
    }

    /// Admission and dequeue are atomic relative to each other: both happen
    /// under the state lock so no two requests share one budget slot.
    fn admit_next(&self) -> Admission {
        let mut state = self.state.lock().expect("queue state poisoned");
        if state.pending.is_empty() {
            state.draining = false;
            return Admission::Done;
        }

        state
            .pending
            .sort_by_key(|r| (std::cmp::Reverse(r.priority), r.seq));

        let now_ms = self.clock.now_ms();
        let mut window = self.window.lock().expect("rate window poisoned");
        if !window.can_admit(now_ms) {
            drop(window);
            drop(state);
            self.set_throttled(true);
            return Admission::Throttled;
        }

        window.record(now_ms);
        drop(window);
        let request = state.pending.remove(0);
        drop(state);
        self.set_throttled(false);
        Admission::Run(request)
    }

    fn set_throttled(&self, throttled: bool) {
        let changed = self.throttle_tx.send_if_modified(|cur| {
            if *cur != throttled {
                *cur = throttled;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!(throttled, "rate window state changed");
        }
    }
}

enum Admission {
    /// Pending list is empty; drain exits.
    Done,
    /// Window is full; back off without dequeuing.
    Throttled,
    /// Admitted: run this request.
    Run(QueuedRequest),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    fn test_queue(limit: usize, clock: Arc<ManualClock>) -> Arc<RequestQueue> {
        RequestQueue::with_backoff(limit, clock, Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_enqueue_returns_result() {
        let clock = ManualClock::at_ms(100_000);
        let queue = test_queue(90, clock);
        let value = queue.enqueue(1, async { Ok(json!({"ok": true})) }).await.unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let clock = ManualClock::at_ms(100_000);
        let queue = test_queue(90, clock);

        let failing = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .enqueue(2, async { Err(WarwatchError::Transport("HTTP 500".to_string())) })
                    .await
            })
        };
        let ok = queue.enqueue(1, async { Ok(json!(1)) }).await;

        assert!(failing.await.unwrap().is_err());
        assert_eq!(ok.unwrap(), json!(1));
        assert_eq!(queue.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_throttled_queue_keeps_requests_and_orders_by_priority() {
        let clock = ManualClock::at_ms(100_000);
        let queue = test_queue(90, clock.clone());

        // Fill the window: 90 requests in the last 60s, limit 90.
        {
            let mut window = queue.window.lock().unwrap();
            for _ in 0..90 {
                window.record(100_000);
            }
        }

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for priority in [1u8, 5, 3] {
            let queue = queue.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                queue
                    .enqueue(priority, async move {
                        order.lock().unwrap().push(priority);
                        Ok(json!(priority))
                    })
                    .await
            }));
        }

        // Let the drain hit the throttle path with all three queued.
        let mut rx = queue.throttle_rx();
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|t| *t))
            .await
            .expect("throttle flag never set")
            .unwrap();
        while queue.pending_len() < 3 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        // Advance past the window; the backlog drains highest-priority first.
        clock.advance_ms(61_000);
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![5, 3, 1]);
        assert!(!queue.is_throttled());
    }

    #[tokio::test]
    async fn test_equal_priority_runs_in_insertion_order() {
        let clock = ManualClock::at_ms(100_000);
        let queue = test_queue(90, clock.clone());
        {
            let mut window = queue.window.lock().unwrap();
            for _ in 0..90 {
                window.record(100_000);
            }
        }

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for (i, tag) in [10u8, 20, 30].into_iter().enumerate() {
            let queue_clone = queue.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                queue_clone
                    .enqueue(2, async move {
                        order.lock().unwrap().push(tag);
                        Ok(Value::Null)
                    })
                    .await
            }));
            // Insertion order is the tie-break under test, so make it
            // deterministic across the spawned tasks.
            while queue.pending_len() < i + 1 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }

        let mut rx = queue.throttle_rx();
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|t| *t))
            .await
            .expect("throttle flag never set")
            .unwrap();

        clock.advance_ms(61_000);
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_throttle_transitions_both_directions() {
        let clock = ManualClock::at_ms(100_000);
        let queue = test_queue(1, clock.clone());
        let mut rx = queue.throttle_rx();
        assert!(!*rx.borrow());

        // First request admits and consumes the whole budget.
        queue.enqueue(1, async { Ok(Value::Null) }).await.unwrap();

        // Second request must throttle, then clear after the window rolls.
        let pending = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.enqueue(1, async { Ok(Value::Null) }).await })
        };
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|t| *t))
            .await
            .expect("never throttled")
            .unwrap();

        clock.advance_ms(61_000);
        pending.await.unwrap().unwrap();
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|t| !*t))
            .await
            .expect("never cleared")
            .unwrap();
    }
}
