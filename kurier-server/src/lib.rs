//! HTTP surface of the Kurier delivery backend.
//!
//! Thin axum layer over `kurier-core`: configuration, error mapping,
//! admission control, and the order/customer handlers.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::Config;
pub use errors::{AppError, AppResult};
pub use state::AppState;
