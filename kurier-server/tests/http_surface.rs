//! HTTP-level behaviour: admission control on mutating routes and the
//! delivery flow driven through the handlers, all against in-memory stores.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::TimeZone;
use serde_json::{Value, json};
use uuid::Uuid;

use kurier_core::analytics::{AnalyticsDispatcher, DispatcherConfig};
use kurier_core::clock::{Clock, ManualClock};
use kurier_core::database::memory::{
    InMemoryCustomerStore, InMemoryDispatchLedger, InMemoryOrderStore,
};
use kurier_core::lifecycle::OrderLifecycle;
use kurier_core::rate_limit::{RateLimitConfig, SlidingWindowLimiter};
use kurier_server::{AppState, routes};

struct TestApp {
    server: TestServer,
    dispatcher: Arc<AnalyticsDispatcher>,
    ledger: Arc<InMemoryDispatchLedger>,
}

fn test_app(max_requests: u32) -> TestApp {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(
        chrono::Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap(),
    ));
    let orders = Arc::new(InMemoryOrderStore::new(clock.clone()));
    let customers = Arc::new(InMemoryCustomerStore::new());
    let ledger = Arc::new(InMemoryDispatchLedger::new());

    let dispatcher = Arc::new(AnalyticsDispatcher::start(
        ledger.clone(),
        Vec::new(),
        DispatcherConfig::default(),
        clock.clone(),
    ));
    let lifecycle = Arc::new(OrderLifecycle::new(
        orders.clone(),
        dispatcher.clone(),
        clock.clone(),
    ));
    let limiter = Arc::new(SlidingWindowLimiter::new(clock.clone()));

    let state = AppState {
        orders,
        customers,
        lifecycle,
        dispatcher: dispatcher.clone(),
        limiter,
        rate_limit: RateLimitConfig {
            max_requests,
            window: std::time::Duration::from_secs(60),
        },
        clock,
    };

    let server = TestServer::new(routes::build_router(state))
        .expect("test server should start");

    TestApp {
        server,
        dispatcher,
        ledger,
    }
}

fn customer_body() -> Value {
    json!({
        "name": "Mara Lindgren",
        "address": "12 Canal St",
        "calorie_tier": "standard",
        "pattern": "daily",
    })
}

#[tokio::test]
async fn test_mutating_route_is_rate_limited_with_headers() {
    let app = test_app(2);

    for expected_remaining in ["1", "0"] {
        let response = app
            .server
            .post("/api/customers")
            .add_header("x-client-id", "panel-1")
            .json(&customer_body())
            .await;

        response.assert_status(StatusCode::CREATED);
        assert_eq!(
            response
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|value| value.to_str().ok()),
            Some(expected_remaining)
        );
    }

    let denied = app
        .server
        .post("/api/customers")
        .add_header("x-client-id", "panel-1")
        .json(&customer_body())
        .await;

    denied.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert!(denied.headers().get("retry-after").is_some());
    assert_eq!(
        denied
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|value| value.to_str().ok()),
        Some("0")
    );

    // A different client still gets through.
    let other = app
        .server
        .post("/api/customers")
        .add_header("x-client-id", "panel-2")
        .json(&customer_body())
        .await;
    other.assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_reads_are_not_rate_limited() {
    let app = test_app(1);

    for _ in 0..5 {
        app.server.get("/healthz").await.assert_status_ok();
    }
}

#[tokio::test]
async fn test_delivery_flow_over_http() {
    let app = test_app(100);
    let courier_id = Uuid::new_v4().to_string();

    let created_customer = app
        .server
        .post("/api/customers")
        .json(&customer_body())
        .await;
    created_customer.assert_status(StatusCode::CREATED);
    let customer: Value = created_customer.json();

    let created_order = app
        .server
        .post("/api/orders")
        .add_header("x-actor-id", Uuid::new_v4().to_string())
        .add_header("x-actor-role", "admin")
        .json(&json!({
            "customer_id": customer["id"],
            "payment_method": "cash",
            "quantity": 2,
        }))
        .await;
    created_order.assert_status(StatusCode::CREATED);
    let order: Value = created_order.json();
    assert_eq!(order["number"], json!(1));
    assert_eq!(order["status"], json!("pending"));

    let order_path = format!(
        "/api/orders/{}",
        order["id"].as_str().expect("order id")
    );

    // An admin may not drive the delivery.
    let forbidden = app
        .server
        .post(&format!("{order_path}/start"))
        .add_header("x-actor-id", Uuid::new_v4().to_string())
        .add_header("x-actor-role", "admin")
        .await;
    forbidden.assert_status(StatusCode::FORBIDDEN);

    let started = app
        .server
        .post(&format!("{order_path}/start"))
        .add_header("x-actor-id", courier_id.clone())
        .add_header("x-actor-role", "courier")
        .await;
    started.assert_status_ok();
    let started: Value = started.json();
    assert_eq!(started["status"], json!("in_delivery"));
    assert_eq!(started["assignee_id"], json!(courier_id));

    let completed = app
        .server
        .post(&format!("{order_path}/complete"))
        .add_header("x-actor-id", courier_id.clone())
        .add_header("x-actor-role", "courier")
        .await;
    completed.assert_status_ok();
    let completed: Value = completed.json();
    assert_eq!(completed["status"], json!("delivered"));
    assert!(completed["delivered_at"].is_string());

    // Replay fails the state guard.
    let replay = app
        .server
        .post(&format!("{order_path}/complete"))
        .add_header("x-actor-id", courier_id)
        .add_header("x-actor-role", "courier")
        .await;
    replay.assert_status(StatusCode::CONFLICT);

    // Exactly one purchase confirmation was recorded for the cash order.
    app.dispatcher.shutdown().await;
    assert_eq!(app.ledger.len().await, 1);
}

#[tokio::test]
async fn test_missing_actor_headers_are_rejected() {
    let app = test_app(100);

    let response = app
        .server
        .post(&format!("/api/orders/{}/start", Uuid::new_v4()))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let app = test_app(100);

    let response = app
        .server
        .get(&format!("/api/orders/{}", Uuid::new_v4()))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_for_unknown_customer_is_rejected() {
    let app = test_app(100);

    let response = app
        .server
        .post("/api/orders")
        .json(&json!({ "customer_id": Uuid::new_v4() }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_customer_update_roundtrip() {
    let app = test_app(100);

    let created = app
        .server
        .post("/api/customers")
        .json(&customer_body())
        .await;
    let customer: Value = created.json();
    let path = format!(
        "/api/customers/{}",
        customer["id"].as_str().expect("customer id")
    );

    let updated = app
        .server
        .patch(&path)
        .json(&json!({ "is_active": false, "calorie_tier": "high" }))
        .await;
    updated.assert_status_ok();

    let fetched: Value = app.server.get(&path).await.json();
    assert_eq!(fetched["is_active"], json!(false));
    assert_eq!(fetched["calorie_tier"], json!("high"));
}
