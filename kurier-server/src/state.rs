use std::fmt;
use std::sync::Arc;

use kurier_core::analytics::AnalyticsDispatcher;
use kurier_core::clock::Clock;
use kurier_core::database::ports::customers::CustomerStore;
use kurier_core::database::ports::orders::OrderStore;
use kurier_core::lifecycle::OrderLifecycle;
use kurier_core::rate_limit::{RateLimitConfig, SlidingWindowLimiter};

/// Shared handler state. Stores are held behind their ports so tests can
/// wire the in-memory implementations.
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderStore>,
    pub customers: Arc<dyn CustomerStore>,
    pub lifecycle: Arc<OrderLifecycle>,
    pub dispatcher: Arc<AnalyticsDispatcher>,
    pub limiter: Arc<SlidingWindowLimiter>,
    pub rate_limit: RateLimitConfig,
    pub clock: Arc<dyn Clock>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}
