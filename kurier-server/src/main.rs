//! # Kurier Server
//!
//! Delivery-order backend.
//!
//! ## Overview
//!
//! Kurier Server drives the recurring-order engine behind a small HTTP
//! surface:
//!
//! - **Recurring Orders**: A periodic scheduler materializes auto-orders
//!   for eligible customers over a rolling 30-day horizon
//! - **Delivery Lifecycle**: Role-gated transitions move orders from
//!   `pending` to `delivered`
//! - **Purchase Analytics**: Paid orders are reported to external
//!   analytics endpoints at most once, backed by a durable ledger
//! - **Admission Control**: Mutating endpoints sit behind a sliding-window
//!   rate limiter
//!
//! ## Architecture
//!
//! The server is built on Axum and uses PostgreSQL for persistent storage.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use kurier_core::analytics::{
    AnalyticsDispatcher, AnalyticsEndpoint, ConversionsEndpoint,
    MeasurementEndpoint,
};
use kurier_core::clock::{Clock, SystemClock};
use kurier_core::database::PostgresDatabase;
use kurier_core::lifecycle::OrderLifecycle;
use kurier_core::rate_limit::SlidingWindowLimiter;
use kurier_core::scheduler::OrderScheduler;

use kurier_server::{AppState, Config, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        "starting kurier-server on {}:{} (scheduler every {}s, rate limit {}/{}s)",
        config.server_host,
        config.server_port,
        config.scheduler_interval_secs,
        config.rate_limit_max_requests,
        config.rate_limit_window_secs
    );

    let database_url = config
        .database_url
        .clone()
        .context("DATABASE_URL must be set")?;
    let db = PostgresDatabase::new(&database_url).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Admission control with its background sweep
    let limiter = Arc::new(SlidingWindowLimiter::new(clock.clone()));
    let sweeper = limiter
        .spawn_sweeper(Duration::from_secs(config.rate_limit_sweep_secs));

    // Analytics endpoints are each optional; absence is a silent no-op
    let dispatcher_config = config.dispatcher();
    let http_client = dispatcher_config.http_client();
    let mut endpoints: Vec<Arc<dyn AnalyticsEndpoint>> = Vec::new();
    match config.measurement() {
        Some(measurement) => endpoints.push(Arc::new(
            MeasurementEndpoint::new(http_client.clone(), measurement),
        )),
        None => warn!("measurement endpoint not configured, skipping"),
    }
    match config.conversions() {
        Some(conversions) => endpoints.push(Arc::new(
            ConversionsEndpoint::new(http_client, conversions),
        )),
        None => warn!("conversions endpoint not configured, skipping"),
    }

    let dispatcher = Arc::new(AnalyticsDispatcher::start(
        db.ledger(),
        endpoints,
        dispatcher_config,
        clock.clone(),
    ));

    let lifecycle = Arc::new(OrderLifecycle::new(
        db.orders(),
        dispatcher.clone(),
        clock.clone(),
    ));

    let scheduler = Arc::new(OrderScheduler::new(
        db.customers(),
        db.orders(),
        clock.clone(),
        config.scheduler(),
    ));
    let scheduler_task = scheduler.spawn();

    let state = AppState {
        orders: db.orders(),
        customers: db.customers(),
        lifecycle,
        dispatcher: dispatcher.clone(),
        limiter,
        rate_limit: config.rate_limit(),
        clock,
    };

    let app = routes::build_router(state);
    let addr: SocketAddr =
        format!("{}:{}", config.server_host, config.server_port)
            .parse()
            .context("invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down background tasks");
    scheduler_task.abort();
    sweeper.abort();
    // Drain whatever the dispatcher already accepted before exiting.
    dispatcher.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
