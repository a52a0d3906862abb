use async_trait::async_trait;
use chrono::{DateTime, Utc};

use kurier_model::{Customer, CustomerId};

use crate::error::Result;

// Customer persistence port. Customer records are owned by the admin
// subsystem; the engine reads them and advances the last-check stamp.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn list_active(&self) -> Result<Vec<Customer>>;

    async fn find(&self, id: CustomerId) -> Result<Option<Customer>>;

    async fn create(&self, customer: Customer) -> Result<Customer>;

    async fn update(&self, customer: &Customer) -> Result<()>;

    /// Record when the scheduler last considered the customer. This is what
    /// re-arms the eligibility window.
    async fn touch_last_check(
        &self,
        id: CustomerId,
        at: DateTime<Utc>,
    ) -> Result<()>;
}
