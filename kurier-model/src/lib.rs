//! Core data model definitions shared across Kurier crates.
#![allow(missing_docs)]

pub mod customer;
pub mod error;
pub mod ids;
pub mod order;
pub mod pattern;

// Intentionally curated re-exports for downstream consumers.
pub use customer::{CalorieTier, Customer};
pub use error::{ModelError, Result as ModelResult};
pub use ids::{CustomerId, OrderId};
pub use order::{
    DeliveryAction, NewOrder, Order, OrderStatus, PaymentMethod, PaymentStatus,
    Role,
};
pub use pattern::{DeliveryPattern, WeekdayFlags};
