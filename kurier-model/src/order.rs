//! Delivery orders and their lifecycle vocabulary.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::customer::CalorieTier;
use crate::error::ModelError;
use crate::ids::{CustomerId, OrderId};

/// Lifecycle status of a delivery order.
///
/// `Delivered` and `Failed` are terminal; everything else can still move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OrderStatus {
    Pending,
    InDelivery,
    Paused,
    Delivered,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InDelivery => "in_delivery",
            OrderStatus::Paused => "paused",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Failed)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(OrderStatus::Pending),
            "in_delivery" => Ok(OrderStatus::InDelivery),
            "paused" => Ok(OrderStatus::Paused),
            "delivered" => Ok(OrderStatus::Delivered),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(ModelError::InvalidValue(format!(
                "unknown order status '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PaymentStatus {
    Paid,
    Unpaid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Unpaid => "unpaid",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "paid" => Ok(PaymentStatus::Paid),
            "unpaid" => Ok(PaymentStatus::Unpaid),
            other => Err(ModelError::InvalidValue(format!(
                "unknown payment status '{other}'"
            ))),
        }
    }
}

/// How an order is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PaymentMethod {
    Card,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Cash => "cash",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "card" => Ok(PaymentMethod::Card),
            "cash" => Ok(PaymentMethod::Cash),
            other => Err(ModelError::InvalidValue(format!(
                "unknown payment method '{other}'"
            ))),
        }
    }
}

/// Role of the staff member acting on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Role {
    Admin,
    Courier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Courier => "courier",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Role::Admin),
            "courier" => Ok(Role::Courier),
            other => Err(ModelError::InvalidValue(format!(
                "unknown role '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action a staff member can take on an order's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DeliveryAction {
    StartDelivery,
    PauseDelivery,
    ResumeDelivery,
    CompleteDelivery,
}

impl DeliveryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryAction::StartDelivery => "start_delivery",
            DeliveryAction::PauseDelivery => "pause_delivery",
            DeliveryAction::ResumeDelivery => "resume_delivery",
            DeliveryAction::CompleteDelivery => "complete_delivery",
        }
    }
}

impl std::fmt::Display for DeliveryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivery order.
///
/// `number` is the human-facing sequential order number: strictly
/// increasing, globally unique, assigned once at creation and never reused.
/// A missing `delivery_date` means "today".
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Order {
    /// Unique order identifier
    pub id: OrderId,
    /// Sequential order number, assigned at creation
    pub number: i64,
    /// Owning customer
    pub customer_id: CustomerId,
    /// Assigned staff member; the admin owner at creation, the courier once
    /// delivery starts
    pub assignee_id: Uuid,
    /// Scheduled delivery date; `None` means today
    pub delivery_date: Option<NaiveDate>,
    /// Scheduled delivery time
    pub delivery_time: NaiveTime,
    /// Number of meal sets
    pub quantity: i32,
    /// Caloric tier carried from the customer's plan
    pub calorie_tier: CalorieTier,
    /// Payment state
    pub payment_status: PaymentStatus,
    /// Payment method
    pub payment_method: PaymentMethod,
    /// Whether the order was prepaid through the plan
    pub prepaid: bool,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Timestamp of record creation
    pub created_at: DateTime<Utc>,
    /// When the order was delivered, stamped by `complete_delivery`
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Fields required to create an order; id, number, status and timestamps
/// are assigned by the store.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub assignee_id: Uuid,
    pub delivery_date: Option<NaiveDate>,
    pub delivery_time: NaiveTime,
    pub quantity: i32,
    pub calorie_tier: CalorieTier,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub prepaid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::InDelivery,
            OrderStatus::Paused,
            OrderStatus::Delivered,
            OrderStatus::Failed,
        ] {
            assert_eq!(OrderStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
        assert!(!OrderStatus::Paused.is_terminal());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!(OrderStatus::from_str("en_route").is_err());
    }
}
