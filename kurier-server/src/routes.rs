use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{customers, health, orders};
use crate::middleware::admission::require_admission;
use crate::state::AppState;

/// Assemble the HTTP surface. Every mutating route passes through the
/// admission middleware; reads and the health probe do not.
pub fn build_router(state: AppState) -> Router {
    let admission = {
        let state = state.clone();
        move || from_fn_with_state(state.clone(), require_admission)
    };

    Router::new()
        .route("/healthz", get(health::healthz))
        .route(
            "/api/orders",
            post(orders::create_order).layer(admission()),
        )
        .route("/api/orders/{id}", get(orders::get_order))
        .route(
            "/api/orders/{id}/start",
            post(orders::start_delivery).layer(admission()),
        )
        .route(
            "/api/orders/{id}/pause",
            post(orders::pause_delivery).layer(admission()),
        )
        .route(
            "/api/orders/{id}/resume",
            post(orders::resume_delivery).layer(admission()),
        )
        .route(
            "/api/orders/{id}/complete",
            post(orders::complete_delivery).layer(admission()),
        )
        .route(
            "/api/customers",
            post(customers::create_customer).layer(admission()),
        )
        .route("/api/customers/{id}", get(customers::get_customer))
        .route(
            "/api/customers/{id}",
            patch(customers::update_customer).layer(admission()),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
