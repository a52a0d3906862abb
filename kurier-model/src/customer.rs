//! Customer records as the scheduler sees them.
//!
//! Customers are owned by the admin subsystem; the engine only reads them
//! and advances `last_checked_at` after a scheduling pass.

use chrono::{DateTime, Utc};

use crate::error::ModelError;
use crate::ids::CustomerId;
use crate::pattern::DeliveryPattern;

/// Caloric tier of a customer's meal plan, carried onto every order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CalorieTier {
    Low,
    #[default]
    Standard,
    High,
}

impl CalorieTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalorieTier::Low => "low",
            CalorieTier::Standard => "standard",
            CalorieTier::High => "high",
        }
    }
}

impl std::str::FromStr for CalorieTier {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(CalorieTier::Low),
            "standard" => Ok(CalorieTier::Standard),
            "high" => Ok(CalorieTier::High),
            other => Err(ModelError::InvalidValue(format!(
                "unknown calorie tier '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for CalorieTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivery customer.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Customer {
    /// Unique customer identifier
    pub id: CustomerId,
    /// Display name
    pub name: String,
    /// Delivery address as free text
    pub address: String,
    /// Caloric tier of the subscribed plan
    pub calorie_tier: CalorieTier,
    /// Weekly delivery cadence; `None` means no days selected
    pub pattern: Option<DeliveryPattern>,
    /// Whether the customer is active (inactive customers are never scheduled)
    pub is_active: bool,
    /// Timestamp of record creation
    pub created_at: DateTime<Utc>,
    /// When the scheduler last considered this customer
    pub last_checked_at: Option<DateTime<Utc>>,
}
