use chrono::{DateTime, Utc};
use thiserror::Error;

use kurier_model::{DeliveryAction, OrderStatus, Role};

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("cannot {action} an order that is {status}")]
    InvalidState {
        action: DeliveryAction,
        status: OrderStatus,
    },

    #[error("role '{role}' is not permitted to {action}")]
    Forbidden {
        action: DeliveryAction,
        role: Role,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("analytics dispatch failed: {0}")]
    Dispatch(String),

    #[error("dispatch ledger unavailable: {0}")]
    Ledger(String),

    #[error("database error: {0}")]
    Database(String),
}

pub type Result<T> = std::result::Result<T, DeliveryError>;
