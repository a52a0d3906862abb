use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use kurier_model::{CustomerId, NewOrder, Order, OrderId, OrderStatus};

use crate::error::Result;

/// Filter for listing and counting orders.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    pub customer_id: Option<CustomerId>,
    pub status: Option<OrderStatus>,
    pub delivery_date: Option<NaiveDate>,
}

/// Field changes applied together with a status change.
///
/// The store commits the status and these fields as one atomic write,
/// guarded on the expected current status.
#[derive(Debug, Clone, Copy)]
pub struct TransitionUpdate {
    pub status: OrderStatus,
    /// Reassign the order (courier takes over on `start_delivery`)
    pub assignee_id: Option<Uuid>,
    /// Stamp of the completed delivery
    pub delivered_at: Option<DateTime<Utc>>,
}

// Order persistence port
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Highest order number assigned so far; 0 when no orders exist.
    async fn find_max_order_number(&self) -> Result<i64>;

    /// Insert a new `pending` order, assigning the next order number.
    ///
    /// Number assignment is serialized inside the store so concurrent
    /// creators never observe the same number.
    async fn create(&self, order: NewOrder) -> Result<Order>;

    async fn find(&self, id: OrderId) -> Result<Option<Order>>;

    /// Atomically move an order out of `expected` status, applying `update`
    /// in the same write. Returns `None` when the order is missing or no
    /// longer in `expected`.
    async fn transition(
        &self,
        id: OrderId,
        expected: OrderStatus,
        update: TransitionUpdate,
    ) -> Result<Option<Order>>;

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>>;

    async fn count(&self, filter: &OrderFilter) -> Result<u64>;
}
