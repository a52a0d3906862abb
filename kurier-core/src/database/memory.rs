//! In-memory store implementations.
//!
//! Mirror the Postgres semantics behind a mutex. Used by the behaviour
//! tests and by tooling that runs without a database; not meant for
//! production durability.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use kurier_model::{
    Customer, CustomerId, NewOrder, Order, OrderId, OrderStatus,
};

use crate::clock::Clock;
use crate::database::ports::customers::CustomerStore;
use crate::database::ports::dispatch_ledger::DispatchLedger;
use crate::database::ports::orders::{
    OrderFilter, OrderStore, TransitionUpdate,
};
use crate::error::Result;

fn matches(order: &Order, filter: &OrderFilter) -> bool {
    if let Some(customer_id) = filter.customer_id {
        if order.customer_id != customer_id {
            return false;
        }
    }
    if let Some(status) = filter.status {
        if order.status != status {
            return false;
        }
    }
    if let Some(date) = filter.delivery_date {
        if order.delivery_date != Some(date) {
            return false;
        }
    }
    true
}

/// Order store backed by a map. Number assignment and transitions happen
/// under the same lock, so the Postgres atomicity guarantees hold here too.
pub struct InMemoryOrderStore {
    clock: Arc<dyn Clock>,
    inner: Mutex<HashMap<OrderId, Order>>,
}

impl std::fmt::Debug for InMemoryOrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryOrderStore").finish()
    }
}

impl InMemoryOrderStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find_max_order_number(&self) -> Result<i64> {
        let orders = self.inner.lock().await;
        Ok(orders.values().map(|o| o.number).max().unwrap_or(0))
    }

    async fn create(&self, order: NewOrder) -> Result<Order> {
        let mut orders = self.inner.lock().await;
        let number =
            orders.values().map(|o| o.number).max().unwrap_or(0) + 1;

        let order = Order {
            id: OrderId::new(),
            number,
            customer_id: order.customer_id,
            assignee_id: order.assignee_id,
            delivery_date: order.delivery_date,
            delivery_time: order.delivery_time,
            quantity: order.quantity,
            calorie_tier: order.calorie_tier,
            payment_status: order.payment_status,
            payment_method: order.payment_method,
            prepaid: order.prepaid,
            status: OrderStatus::Pending,
            created_at: self.clock.now(),
            delivered_at: None,
        };

        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.lock().await.get(&id).cloned())
    }

    async fn transition(
        &self,
        id: OrderId,
        expected: OrderStatus,
        update: TransitionUpdate,
    ) -> Result<Option<Order>> {
        let mut orders = self.inner.lock().await;
        let Some(order) = orders.get_mut(&id) else {
            return Ok(None);
        };
        if order.status != expected {
            return Ok(None);
        }

        order.status = update.status;
        if let Some(assignee_id) = update.assignee_id {
            order.assignee_id = assignee_id;
        }
        if let Some(delivered_at) = update.delivered_at {
            order.delivered_at = Some(delivered_at);
        }

        Ok(Some(order.clone()))
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let orders = self.inner.lock().await;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|order| matches(order, filter))
            .cloned()
            .collect();
        matching.sort_by_key(|order| order.number);
        Ok(matching)
    }

    async fn count(&self, filter: &OrderFilter) -> Result<u64> {
        let orders = self.inner.lock().await;
        Ok(orders.values().filter(|order| matches(order, filter)).count()
            as u64)
    }
}

/// Customer store backed by a map.
#[derive(Debug, Default)]
pub struct InMemoryCustomerStore {
    inner: Mutex<HashMap<CustomerId, Customer>>,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn list_active(&self) -> Result<Vec<Customer>> {
        let customers = self.inner.lock().await;
        let mut active: Vec<Customer> = customers
            .values()
            .filter(|customer| customer.is_active)
            .cloned()
            .collect();
        active.sort_by_key(|customer| customer.created_at);
        Ok(active)
    }

    async fn find(&self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.inner.lock().await.get(&id).cloned())
    }

    async fn create(&self, customer: Customer) -> Result<Customer> {
        self.inner
            .lock()
            .await
            .insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn update(&self, customer: &Customer) -> Result<()> {
        self.inner
            .lock()
            .await
            .insert(customer.id, customer.clone());
        Ok(())
    }

    async fn touch_last_check(
        &self,
        id: CustomerId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(customer) = self.inner.lock().await.get_mut(&id) {
            customer.last_checked_at = Some(at);
        }
        Ok(())
    }
}

/// Dispatch ledger backed by a set; insert races collapse the same way the
/// unique index does.
#[derive(Debug, Default)]
pub struct InMemoryDispatchLedger {
    inner: Mutex<HashSet<(Uuid, String)>>,
}

impl InMemoryDispatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded dispatches. Test helper.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether the ledger is empty. Test helper.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[async_trait]
impl DispatchLedger for InMemoryDispatchLedger {
    async fn has_dispatched(
        &self,
        entity_id: Uuid,
        event_name: &str,
    ) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .await
            .contains(&(entity_id, event_name.to_string())))
    }

    async fn mark_dispatched(
        &self,
        entity_id: Uuid,
        event_name: &str,
    ) -> Result<()> {
        self.inner
            .lock()
            .await
            .insert((entity_id, event_name.to_string()));
        Ok(())
    }
}
