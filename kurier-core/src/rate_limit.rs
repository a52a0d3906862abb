//! Sliding-window admission control for mutating endpoints.
//!
//! Keeps the full log of request timestamps per client key inside the
//! trailing window, so the count is exact rather than bucketed. State is
//! ephemeral and process-local; records are created lazily on first use and
//! evicted by a periodic sweep once their window has fully elapsed.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::clock::Clock;

/// Limits applied to a single client key.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum number of requests allowed inside the window
    pub max_requests: u32,
    /// Length of the trailing window
    pub window: std::time::Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window: std::time::Duration::from_secs(60),
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RateLimitDecision {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Requests left in the window after this one
    pub remaining: u32,
    /// When the window frees up again
    pub reset_at: DateTime<Utc>,
}

/// Request log for one client key.
#[derive(Debug)]
struct ClientWindow {
    hits: Vec<DateTime<Utc>>,
    /// End of the bookkeeping window; once passed, the record is stale and
    /// can be reset in place or swept
    reset_at: DateTime<Utc>,
}

/// Process-local sliding-window rate limiter.
///
/// All per-key logs live behind one mutex, which is the mutual exclusion
/// for the read-modify-write on the timestamp lists. Admission is
/// infallible by contract and fails closed: if the lock is poisoned the
/// request is denied.
pub struct SlidingWindowLimiter {
    windows: Mutex<HashMap<String, ClientWindow>>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for SlidingWindowLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tracked = self.windows.lock().map(|w| w.len()).unwrap_or(0);
        f.debug_struct("SlidingWindowLimiter")
            .field("tracked_keys", &tracked)
            .finish()
    }
}

impl SlidingWindowLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Check and record one request for `client_id`.
    ///
    /// Expired timestamps are dropped first; if the surviving count has
    /// reached the limit the request is denied and `reset_at` reports when
    /// the oldest surviving hit leaves the window. Otherwise the request is
    /// recorded and admitted.
    pub fn admit(
        &self,
        client_id: &str,
        config: &RateLimitConfig,
    ) -> RateLimitDecision {
        let now = self.clock.now();
        let window = Duration::from_std(config.window)
            .unwrap_or_else(|_| Duration::seconds(60));

        let Ok(mut windows) = self.windows.lock() else {
            // Limiter state unavailable; deny rather than guess.
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: now + window,
            };
        };

        let state =
            windows.entry(client_id.to_string()).or_insert_with(|| {
                ClientWindow {
                    hits: Vec::new(),
                    reset_at: now + window,
                }
            });

        // A record whose bookkeeping window fully elapsed starts over.
        if state.reset_at <= now {
            state.hits.clear();
        }

        let cutoff = now - window;
        state.hits.retain(|hit| *hit > cutoff);

        if state.hits.len() as u32 >= config.max_requests {
            let oldest = state.hits.first().copied().unwrap_or(now);
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: oldest + window,
            };
        }

        state.hits.push(now);
        state.reset_at = now + window;

        let oldest = state.hits.first().copied().unwrap_or(now);
        RateLimitDecision {
            allowed: true,
            remaining: config.max_requests - state.hits.len() as u32,
            reset_at: oldest + window,
        }
    }

    /// Drop records whose bookkeeping window has fully elapsed.
    pub fn sweep(&self) {
        let now = self.clock.now();
        let Ok(mut windows) = self.windows.lock() else {
            return;
        };

        let before = windows.len();
        windows.retain(|_, window| window.reset_at > now);

        let removed = before - windows.len();
        if removed > 0 {
            debug!("rate limiter sweep removed {} expired windows", removed);
        }
    }

    /// Spawn the periodic sweep task bounding memory use.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut sweep_interval = tokio::time::interval(every);
            loop {
                sweep_interval.tick().await;
                limiter.sweep();
            }
        })
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> Vec<String> {
        self.windows
            .lock()
            .map(|windows| windows.keys().cloned().collect())
            .unwrap_or_default()
    }
}
