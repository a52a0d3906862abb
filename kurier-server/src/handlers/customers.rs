use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use kurier_model::{CalorieTier, Customer, CustomerId, DeliveryPattern};

use crate::errors::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub address: String,
    pub calorie_tier: Option<CalorieTier>,
    pub pattern: Option<DeliveryPattern>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub calorie_tier: Option<CalorieTier>,
    pub pattern: Option<DeliveryPattern>,
    pub is_active: Option<bool>,
}

pub async fn create_customer(
    State(state): State<AppState>,
    Json(request): Json<CreateCustomerRequest>,
) -> AppResult<(StatusCode, Json<Customer>)> {
    if request.name.trim().is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    if request.address.trim().is_empty() {
        return Err(AppError::bad_request("address must not be empty"));
    }

    let customer = state
        .customers
        .create(Customer {
            id: CustomerId::new(),
            name: request.name,
            address: request.address,
            calorie_tier: request.calorie_tier.unwrap_or_default(),
            pattern: request.pattern,
            is_active: request.is_active,
            created_at: state.clock.now(),
            last_checked_at: None,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Customer>> {
    let customer = state
        .customers
        .find(CustomerId::from(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("customer {id}")))?;

    Ok(Json(customer))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCustomerRequest>,
) -> AppResult<Json<Customer>> {
    let mut customer = state
        .customers
        .find(CustomerId::from(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("customer {id}")))?;

    if let Some(name) = request.name {
        customer.name = name;
    }
    if let Some(address) = request.address {
        customer.address = address;
    }
    if let Some(calorie_tier) = request.calorie_tier {
        customer.calorie_tier = calorie_tier;
    }
    if let Some(pattern) = request.pattern {
        customer.pattern = Some(pattern);
    }
    if let Some(is_active) = request.is_active {
        customer.is_active = is_active;
    }

    state.customers.update(&customer).await?;
    Ok(Json(customer))
}
