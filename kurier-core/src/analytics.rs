//! Outbound purchase-conversion dispatch.
//!
//! Paid orders are reported to external analytics endpoints at most once.
//! The dispatcher is fire-and-forget from the caller's point of view: a
//! transition or handler enqueues the order and moves on, a worker task
//! consumes the queue, consults the [`DispatchLedger`], attempts every
//! configured endpoint concurrently, and records the dispatch.
//!
//! Delivery is deliberately best-effort. Non-2xx responses are swallowed
//! (fire, don't verify) and only network-level failures count as errors; a
//! permanently failed send is lost rather than retried, because these are
//! analytics signals, not financial postings. Ledger bookkeeping is also
//! best-effort: an unreachable ledger reads as "not yet dispatched" and a
//! failed mark degrades to a small duplicate risk instead of a lost event.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use kurier_model::Order;

use crate::clock::Clock;
use crate::database::ports::dispatch_ledger::DispatchLedger;
use crate::error::{DeliveryError, Result};
use crate::lifecycle::PurchaseNotifier;

/// Ledger event name for purchase confirmations.
pub const PURCHASE_EVENT: &str = "order_paid";

const MEASUREMENT_URL: &str = "https://www.google-analytics.com/mp/collect";
const CONVERSIONS_URL: &str = "https://graph.facebook.com/v18.0";

/// Attribution fields attached to every payload. Unknown fields are
/// omitted from the wire format.
#[derive(Debug, Clone, Default)]
pub struct Attribution {
    pub locale: Option<String>,
    pub region: Option<String>,
    pub campaign: Option<String>,
}

/// Endpoint-independent view of a purchase event.
#[derive(Debug, Clone)]
pub struct PurchasePayload {
    /// Human-facing order number, doubling as the transaction id
    pub transaction_id: String,
    /// Owning customer, used as the client identity where required
    pub client_id: String,
    pub currency: String,
    pub value: f64,
    pub quantity: i32,
    pub item_name: String,
    pub event_time: chrono::DateTime<chrono::Utc>,
    pub attribution: Attribution,
}

/// A single outbound analytics target.
#[async_trait]
pub trait AnalyticsEndpoint: Send + Sync {
    fn name(&self) -> &'static str;

    /// Attempt delivery. Only a network-level failure is an error; any
    /// HTTP response, 2xx or not, counts as a completed attempt.
    async fn send(&self, payload: &PurchasePayload) -> Result<()>;
}

/// Credentials for the measurement-protocol endpoint.
#[derive(Debug, Clone)]
pub struct MeasurementConfig {
    pub measurement_id: String,
    pub api_secret: String,
}

/// Measurement-protocol analytics endpoint.
#[derive(Debug, Clone)]
pub struct MeasurementEndpoint {
    client: reqwest::Client,
    config: MeasurementConfig,
}

impl MeasurementEndpoint {
    pub fn new(client: reqwest::Client, config: MeasurementConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl AnalyticsEndpoint for MeasurementEndpoint {
    fn name(&self) -> &'static str {
        "measurement_protocol"
    }

    async fn send(&self, payload: &PurchasePayload) -> Result<()> {
        let url = format!(
            "{MEASUREMENT_URL}?measurement_id={}&api_secret={}",
            self.config.measurement_id, self.config.api_secret
        );

        let mut params = serde_json::Map::new();
        params.insert("transaction_id".into(), json!(payload.transaction_id));
        params.insert("currency".into(), json!(payload.currency));
        params.insert("value".into(), json!(payload.value));
        params.insert(
            "items".into(),
            json!([{
                "item_name": payload.item_name,
                "quantity": payload.quantity,
                "price": payload.value,
            }]),
        );
        if let Some(locale) = &payload.attribution.locale {
            params.insert("locale".into(), json!(locale));
        }
        if let Some(campaign) = &payload.attribution.campaign {
            params.insert("campaign".into(), json!(campaign));
        }

        let body = json!({
            "client_id": payload.client_id,
            "events": [{ "name": "purchase", "params": params }],
        });

        match self.client.post(&url).json(&body).send().await {
            Ok(response) => {
                if !response.status().is_success() {
                    debug!(
                        "measurement endpoint returned {} for order {}",
                        response.status(),
                        payload.transaction_id
                    );
                }
                Ok(())
            }
            Err(err) => Err(DeliveryError::Dispatch(format!(
                "measurement endpoint unreachable: {err}"
            ))),
        }
    }
}

/// Credentials for the conversions-API endpoint.
#[derive(Debug, Clone)]
pub struct ConversionsConfig {
    pub pixel_id: String,
    pub access_token: String,
}

/// Conversions-API analytics endpoint.
#[derive(Debug, Clone)]
pub struct ConversionsEndpoint {
    client: reqwest::Client,
    config: ConversionsConfig,
}

impl ConversionsEndpoint {
    pub fn new(client: reqwest::Client, config: ConversionsConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl AnalyticsEndpoint for ConversionsEndpoint {
    fn name(&self) -> &'static str {
        "conversions_api"
    }

    async fn send(&self, payload: &PurchasePayload) -> Result<()> {
        let url = format!(
            "{CONVERSIONS_URL}/{}/events?access_token={}",
            self.config.pixel_id, self.config.access_token
        );

        let mut custom_data = serde_json::Map::new();
        custom_data.insert("currency".into(), json!(payload.currency));
        custom_data.insert("value".into(), json!(payload.value));
        custom_data
            .insert("order_id".into(), json!(payload.transaction_id));
        if let Some(region) = &payload.attribution.region {
            custom_data.insert("delivery_region".into(), json!(region));
        }
        if let Some(campaign) = &payload.attribution.campaign {
            custom_data.insert("campaign".into(), json!(campaign));
        }

        let body = json!({
            "data": [{
                "event_name": "Purchase",
                "event_time": payload.event_time.timestamp(),
                "event_id": payload.transaction_id,
                "action_source": "system_generated",
                "custom_data": custom_data,
            }],
        });

        match self.client.post(&url).json(&body).send().await {
            Ok(response) => {
                if !response.status().is_success() {
                    debug!(
                        "conversions endpoint returned {} for order {}",
                        response.status(),
                        payload.transaction_id
                    );
                }
                Ok(())
            }
            Err(err) => Err(DeliveryError::Dispatch(format!(
                "conversions endpoint unreachable: {err}"
            ))),
        }
    }
}

/// Dispatcher tuning and payload defaults.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Bound on queued purchase events; overflow is dropped with a warning
    pub queue_capacity: usize,
    pub currency: String,
    /// Price of one meal set, used for the reported monetary value
    pub set_price: f64,
    pub attribution: Attribution,
    /// Timeout for each outbound HTTP attempt
    pub request_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            currency: "EUR".to_string(),
            set_price: 15.0,
            attribution: Attribution::default(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl DispatcherConfig {
    /// HTTP client honoring the configured per-request timeout.
    pub fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .unwrap_or_default()
    }
}

struct Worker {
    ledger: Arc<dyn DispatchLedger>,
    endpoints: Vec<Arc<dyn AnalyticsEndpoint>>,
    config: DispatcherConfig,
    clock: Arc<dyn Clock>,
}

impl Worker {
    async fn run(self, mut queue: mpsc::Receiver<Order>) {
        while let Some(order) = queue.recv().await {
            self.process(order).await;
        }
        info!("analytics dispatcher drained");
    }

    async fn process(&self, order: Order) {
        let entity_id = order.id.to_uuid();

        match self.ledger.has_dispatched(entity_id, PURCHASE_EVENT).await {
            Ok(true) => {
                debug!(
                    "purchase event already sent for order {}, skipping",
                    order.number
                );
                return;
            }
            Ok(false) => {}
            // Unreachable ledger reads as "not dispatched": losing the
            // confirmation entirely is worse than a rare duplicate.
            Err(err) => warn!(
                "dispatch ledger read failed for order {}: {}",
                order.number, err
            ),
        }

        let payload = self.payload_for(&order);
        let attempts = self.endpoints.iter().map(|endpoint| {
            let payload = &payload;
            async move {
                if let Err(err) = endpoint.send(payload).await {
                    warn!(
                        "analytics delivery to {} failed for order {}: {}",
                        endpoint.name(),
                        payload.transaction_id,
                        err
                    );
                }
            }
        });
        futures::future::join_all(attempts).await;

        // The ledger gates repeats, it is not a retry queue: partial or
        // even total endpoint failure still marks the order dispatched.
        if let Err(err) =
            self.ledger.mark_dispatched(entity_id, PURCHASE_EVENT).await
        {
            warn!(
                "failed to record dispatch of order {}: {}",
                order.number, err
            );
        }
    }

    fn payload_for(&self, order: &Order) -> PurchasePayload {
        PurchasePayload {
            transaction_id: order.number.to_string(),
            client_id: order.customer_id.to_string(),
            currency: self.config.currency.clone(),
            value: self.config.set_price * f64::from(order.quantity),
            quantity: order.quantity,
            item_name: format!("meal_set_{}", order.calorie_tier),
            event_time: self.clock.now(),
            attribution: self.config.attribution.clone(),
        }
    }
}

/// Queue handle for purchase-conversion dispatch.
///
/// Created with [`AnalyticsDispatcher::start`], which spawns the worker
/// task. [`AnalyticsDispatcher::shutdown`] closes the queue and waits for
/// the worker to drain it.
pub struct AnalyticsDispatcher {
    queue: Mutex<Option<mpsc::Sender<Order>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for AnalyticsDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsDispatcher").finish()
    }
}

impl AnalyticsDispatcher {
    /// Spawn the worker task consuming the dispatch queue.
    pub fn start(
        ledger: Arc<dyn DispatchLedger>,
        endpoints: Vec<Arc<dyn AnalyticsEndpoint>>,
        config: DispatcherConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));

        info!(
            "analytics dispatcher started with {} endpoint(s)",
            endpoints.len()
        );

        let worker = Worker {
            ledger,
            endpoints,
            config,
            clock,
        };
        let handle = tokio::spawn(worker.run(rx));

        Self {
            queue: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Queue a purchase-conversion event. Never blocks the caller; a full
    /// or closed queue drops the event with a warning.
    pub fn dispatch_purchase(&self, order: &Order) {
        let Ok(guard) = self.queue.lock() else {
            return;
        };
        let Some(queue) = guard.as_ref() else {
            warn!(
                "analytics dispatcher stopped, dropping purchase event for order {}",
                order.number
            );
            return;
        };

        match queue.try_send(order.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(
                "analytics queue full, dropping purchase event for order {}",
                order.number
            ),
            Err(TrySendError::Closed(_)) => warn!(
                "analytics dispatcher stopped, dropping purchase event for order {}",
                order.number
            ),
        }
    }

    /// Close the queue and wait for the worker to drain what was accepted.
    pub async fn shutdown(&self) {
        let sender = self.queue.lock().ok().and_then(|mut guard| guard.take());
        drop(sender);

        let handle =
            self.worker.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl PurchaseNotifier for AnalyticsDispatcher {
    fn order_paid(&self, order: &Order) {
        self.dispatch_purchase(order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::database::memory::InMemoryDispatchLedger;
    use chrono::TimeZone;
    use kurier_model::{
        CalorieTier, CustomerId, OrderId, OrderStatus, PaymentMethod,
        PaymentStatus,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn sample_order() -> Order {
        Order {
            id: OrderId::new(),
            number: 101,
            customer_id: CustomerId::new(),
            assignee_id: Uuid::new_v4(),
            delivery_date: None,
            delivery_time: chrono::NaiveTime::from_hms_opt(12, 30, 0)
                .unwrap(),
            quantity: 2,
            calorie_tier: CalorieTier::Standard,
            payment_status: PaymentStatus::Paid,
            payment_method: PaymentMethod::Cash,
            prepaid: false,
            status: OrderStatus::Delivered,
            created_at: chrono::Utc::now(),
            delivered_at: Some(chrono::Utc::now()),
        }
    }

    fn test_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            chrono::Utc.with_ymd_and_hms(2024, 5, 6, 14, 0, 0).unwrap(),
        ))
    }

    #[derive(Default)]
    struct RecordingEndpoint {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnalyticsEndpoint for RecordingEndpoint {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, _payload: &PurchasePayload) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FailingEndpoint {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnalyticsEndpoint for FailingEndpoint {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn send(&self, _payload: &PurchasePayload) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DeliveryError::Dispatch("connection refused".to_string()))
        }
    }

    /// Ledger whose reads always fail; marks still land.
    struct UnreadableLedger {
        inner: InMemoryDispatchLedger,
    }

    #[async_trait]
    impl DispatchLedger for UnreadableLedger {
        async fn has_dispatched(
            &self,
            _entity_id: Uuid,
            _event_name: &str,
        ) -> Result<bool> {
            Err(DeliveryError::Ledger("connection refused".to_string()))
        }

        async fn mark_dispatched(
            &self,
            entity_id: Uuid,
            event_name: &str,
        ) -> Result<()> {
            self.inner.mark_dispatched(entity_id, event_name).await
        }
    }

    #[tokio::test]
    async fn test_dispatch_sends_once_and_records() {
        let ledger = Arc::new(InMemoryDispatchLedger::new());
        let endpoint = Arc::new(RecordingEndpoint::default());
        let dispatcher = AnalyticsDispatcher::start(
            ledger.clone(),
            vec![endpoint.clone()],
            DispatcherConfig::default(),
            test_clock(),
        );

        let order = sample_order();
        dispatcher.dispatch_purchase(&order);
        dispatcher.shutdown().await;

        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);
        assert!(
            ledger
                .has_dispatched(order.id.to_uuid(), PURCHASE_EVENT)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_replay_produces_no_additional_sends() {
        let ledger = Arc::new(InMemoryDispatchLedger::new());
        let endpoint = Arc::new(RecordingEndpoint::default());
        let dispatcher = AnalyticsDispatcher::start(
            ledger.clone(),
            vec![endpoint.clone()],
            DispatcherConfig::default(),
            test_clock(),
        );

        let order = sample_order();
        dispatcher.dispatch_purchase(&order);
        dispatcher.dispatch_purchase(&order);
        dispatcher.shutdown().await;

        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_preexisting_record_skips_delivery() {
        let ledger = Arc::new(InMemoryDispatchLedger::new());
        let order = sample_order();
        ledger
            .mark_dispatched(order.id.to_uuid(), PURCHASE_EVENT)
            .await
            .unwrap();

        let endpoint = Arc::new(RecordingEndpoint::default());
        let dispatcher = AnalyticsDispatcher::start(
            ledger,
            vec![endpoint.clone()],
            DispatcherConfig::default(),
            test_clock(),
        );

        dispatcher.dispatch_purchase(&order);
        dispatcher.shutdown().await;

        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_endpoint_failure_still_marks_dispatched() {
        let ledger = Arc::new(InMemoryDispatchLedger::new());
        let failing = Arc::new(FailingEndpoint::default());
        let working = Arc::new(RecordingEndpoint::default());
        let dispatcher = AnalyticsDispatcher::start(
            ledger.clone(),
            vec![failing.clone(), working.clone()],
            DispatcherConfig::default(),
            test_clock(),
        );

        let order = sample_order();
        dispatcher.dispatch_purchase(&order);
        dispatcher.shutdown().await;

        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(working.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_unreadable_ledger_still_attempts_delivery() {
        let ledger = Arc::new(UnreadableLedger {
            inner: InMemoryDispatchLedger::new(),
        });
        let endpoint = Arc::new(RecordingEndpoint::default());
        let dispatcher = AnalyticsDispatcher::start(
            ledger.clone(),
            vec![endpoint.clone()],
            DispatcherConfig::default(),
            test_clock(),
        );

        dispatcher.dispatch_purchase(&sample_order());
        dispatcher.shutdown().await;

        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.inner.len().await, 1);
    }

    #[tokio::test]
    async fn test_no_configured_endpoints_is_a_silent_noop() {
        let ledger = Arc::new(InMemoryDispatchLedger::new());
        let dispatcher = AnalyticsDispatcher::start(
            ledger.clone(),
            Vec::new(),
            DispatcherConfig::default(),
            test_clock(),
        );

        dispatcher.dispatch_purchase(&sample_order());
        dispatcher.shutdown().await;

        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown_is_dropped() {
        let ledger = Arc::new(InMemoryDispatchLedger::new());
        let dispatcher = AnalyticsDispatcher::start(
            ledger.clone(),
            Vec::new(),
            DispatcherConfig::default(),
            test_clock(),
        );

        dispatcher.shutdown().await;
        dispatcher.dispatch_purchase(&sample_order());

        assert!(ledger.is_empty().await);
    }
}
