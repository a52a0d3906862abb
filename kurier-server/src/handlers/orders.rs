use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use uuid::Uuid;

use kurier_core::lifecycle::Actor;
use kurier_model::{
    CalorieTier, NewOrder, Order, OrderId, PaymentMethod, PaymentStatus, Role,
};

use crate::errors::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    /// Staff owner; defaults to the acting staff member
    pub assignee_id: Option<Uuid>,
    /// Omitted means delivery today
    pub delivery_date: Option<NaiveDate>,
    pub delivery_time: Option<NaiveTime>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    pub calorie_tier: Option<CalorieTier>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub prepaid: bool,
}

fn default_quantity() -> i32 {
    1
}

/// Read the acting staff member from the `x-actor-id`/`x-actor-role`
/// headers. Token verification happens upstream; these carry the already
/// authenticated identity.
pub(crate) fn actor_from_headers(headers: &HeaderMap) -> AppResult<Actor> {
    let id = headers
        .get("x-actor-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| {
            AppError::bad_request("missing or invalid x-actor-id header")
        })?;

    let role = headers
        .get("x-actor-role")
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| Role::from_str(raw).ok())
        .ok_or_else(|| {
            AppError::bad_request("missing or invalid x-actor-role header")
        })?;

    Ok(Actor { id, role })
}

/// Create an order manually.
///
/// Goes through the same store path as the scheduler, so manual and
/// generated orders share one number sequence.
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<Order>)> {
    if request.quantity < 1 {
        return Err(AppError::bad_request("quantity must be at least 1"));
    }

    let customer = state
        .customers
        .find(request.customer_id.into())
        .await?
        .ok_or_else(|| {
            AppError::not_found(format!(
                "customer {} does not exist",
                request.customer_id
            ))
        })?;

    let assignee_id = request
        .assignee_id
        .or_else(|| actor_from_headers(&headers).ok().map(|actor| actor.id))
        .unwrap_or(Uuid::nil());

    let order = state
        .orders
        .create(NewOrder {
            customer_id: customer.id,
            assignee_id,
            delivery_date: request.delivery_date,
            delivery_time: request
                .delivery_time
                .unwrap_or_else(|| NaiveTime::from_hms_opt(12, 0, 0)
                    .unwrap_or(NaiveTime::MIN)),
            quantity: request.quantity,
            calorie_tier: request
                .calorie_tier
                .unwrap_or(customer.calorie_tier),
            payment_status: request
                .payment_status
                .unwrap_or(PaymentStatus::Unpaid),
            payment_method: request
                .payment_method
                .unwrap_or(PaymentMethod::Cash),
            prepaid: request.prepaid,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let order = state
        .orders
        .find(OrderId::from(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("order {id}")))?;

    Ok(Json(order))
}

pub async fn start_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<Order>> {
    let actor = actor_from_headers(&headers)?;
    let order = state.lifecycle.start(OrderId::from(id), actor).await?;
    Ok(Json(order))
}

pub async fn pause_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<Order>> {
    let actor = actor_from_headers(&headers)?;
    let order = state.lifecycle.pause(OrderId::from(id), actor).await?;
    Ok(Json(order))
}

pub async fn resume_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<Order>> {
    let actor = actor_from_headers(&headers)?;
    let order = state.lifecycle.resume(OrderId::from(id), actor).await?;
    Ok(Json(order))
}

pub async fn complete_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<Order>> {
    let actor = actor_from_headers(&headers)?;
    let order = state.lifecycle.complete(OrderId::from(id), actor).await?;
    Ok(Json(order))
}
