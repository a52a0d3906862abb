//! Rate-limit admission control for mutating routes.
//!
//! Every request passing through here counts against the client's sliding
//! window before any business logic runs. Denials answer 429 with a
//! `retry-after` hint; admitted responses carry the remaining budget and
//! window reset in `x-ratelimit-*` headers.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use kurier_core::DeliveryError;

use crate::errors::AppError;
use crate::state::AppState;

const HEADER_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_RESET: &str = "x-ratelimit-reset";

pub async fn require_admission(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let client_key = client_key(request.headers());
    let decision = state.limiter.admit(&client_key, &state.rate_limit);

    if !decision.allowed {
        let retry_after = (decision.reset_at - state.clock.now())
            .num_seconds()
            .max(0);
        warn!(
            "rate limit exceeded for client '{}', retry in {}s",
            client_key, retry_after
        );

        let error: AppError = DeliveryError::RateLimited {
            reset_at: decision.reset_at,
        }
        .into();
        let mut response = error.into_response();
        let headers = response.headers_mut();
        headers.insert("retry-after", header_value(retry_after));
        headers.insert(HEADER_REMAINING, header_value(0));
        headers
            .insert(HEADER_RESET, header_value(decision.reset_at.timestamp()));
        return response;
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers
        .insert(HEADER_REMAINING, header_value(i64::from(decision.remaining)));
    headers.insert(HEADER_RESET, header_value(decision.reset_at.timestamp()));
    response
}

/// Client identity for admission accounting: the `x-client-id` header when
/// present, else the first `x-forwarded-for` hop, else a shared bucket.
fn client_key(headers: &HeaderMap) -> String {
    if let Some(client_id) = headers
        .get("x-client-id")
        .and_then(|value| value.to_str().ok())
    {
        return client_id.to_string();
    }

    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.split(',').next())
        .map(|ip| ip.trim().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

fn header_value(value: i64) -> HeaderValue {
    HeaderValue::from_str(&value.to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("0"))
}
