//! Delivery lifecycle state machine.
//!
//! States run `pending → in_delivery ⇄ paused → delivered`, with `failed`
//! reachable from `pending` and `in_delivery` for the wider domain. Every
//! action is role-gated, and a transition commits the status change and its
//! side fields (courier assignment, delivery stamp) in one guarded store
//! update, so racing actors cannot double-apply an action.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use kurier_model::{
    DeliveryAction, Order, OrderId, OrderStatus, PaymentMethod,
    PaymentStatus, Role,
};

use crate::clock::Clock;
use crate::database::ports::orders::{OrderStore, TransitionUpdate};
use crate::error::{DeliveryError, Result};

/// Staff member acting on an order.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

/// Seam to the analytics dispatcher.
///
/// Called after a transition commits; implementations must hand the order
/// off without blocking, and a failed notification never fails the
/// transition that triggered it.
pub trait PurchaseNotifier: Send + Sync {
    fn order_paid(&self, order: &Order);
}

/// Notifier that drops every event; wiring for setups without analytics.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl PurchaseNotifier for NullNotifier {
    fn order_paid(&self, _order: &Order) {}
}

/// Validates and applies delivery status transitions.
pub struct OrderLifecycle {
    orders: Arc<dyn OrderStore>,
    notifier: Arc<dyn PurchaseNotifier>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for OrderLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderLifecycle").finish()
    }
}

impl OrderLifecycle {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        notifier: Arc<dyn PurchaseNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orders,
            notifier,
            clock,
        }
    }

    /// Apply `action` to the order on behalf of `actor`.
    ///
    /// Fails with [`DeliveryError::Forbidden`] when the actor's role does
    /// not permit the action, and with [`DeliveryError::InvalidState`] when
    /// the order is not in a state the action accepts (including losing a
    /// race against a concurrent transition).
    pub async fn apply(
        &self,
        order_id: OrderId,
        action: DeliveryAction,
        actor: Actor,
    ) -> Result<Order> {
        let order = self.orders.find(order_id).await?.ok_or_else(|| {
            DeliveryError::NotFound(format!("order {order_id}"))
        })?;

        // Every delivery action belongs to couriers.
        if actor.role != Role::Courier {
            return Err(DeliveryError::Forbidden {
                action,
                role: actor.role,
            });
        }

        let allowed_from: &[OrderStatus] = match action {
            DeliveryAction::StartDelivery => &[OrderStatus::Pending],
            DeliveryAction::PauseDelivery => &[OrderStatus::InDelivery],
            DeliveryAction::ResumeDelivery => &[OrderStatus::Paused],
            // The courier on site may complete a paused delivery directly.
            DeliveryAction::CompleteDelivery => {
                &[OrderStatus::InDelivery, OrderStatus::Paused]
            }
        };
        if !allowed_from.contains(&order.status) {
            return Err(DeliveryError::InvalidState {
                action,
                status: order.status,
            });
        }

        let update = TransitionUpdate {
            status: match action {
                DeliveryAction::StartDelivery
                | DeliveryAction::ResumeDelivery => OrderStatus::InDelivery,
                DeliveryAction::PauseDelivery => OrderStatus::Paused,
                DeliveryAction::CompleteDelivery => OrderStatus::Delivered,
            },
            assignee_id: (action == DeliveryAction::StartDelivery)
                .then_some(actor.id),
            delivered_at: (action == DeliveryAction::CompleteDelivery)
                .then(|| self.clock.now()),
        };

        let updated = self
            .orders
            .transition(order_id, order.status, update)
            .await?
            .ok_or(DeliveryError::InvalidState {
                action,
                status: order.status,
            })?;

        debug!(
            "order {} moved {} -> {} by {}",
            updated.number, order.status, updated.status, actor.id
        );

        if Self::confirms_purchase(action, &updated) {
            self.notifier.order_paid(&updated);
        }

        Ok(updated)
    }

    pub async fn start(&self, order_id: OrderId, actor: Actor) -> Result<Order> {
        self.apply(order_id, DeliveryAction::StartDelivery, actor).await
    }

    pub async fn pause(&self, order_id: OrderId, actor: Actor) -> Result<Order> {
        self.apply(order_id, DeliveryAction::PauseDelivery, actor).await
    }

    pub async fn resume(
        &self,
        order_id: OrderId,
        actor: Actor,
    ) -> Result<Order> {
        self.apply(order_id, DeliveryAction::ResumeDelivery, actor)
            .await
    }

    pub async fn complete(
        &self,
        order_id: OrderId,
        actor: Actor,
    ) -> Result<Order> {
        self.apply(order_id, DeliveryAction::CompleteDelivery, actor)
            .await
    }

    /// Cash orders confirm when delivered; orders already paid confirm on
    /// any transition.
    fn confirms_purchase(action: DeliveryAction, order: &Order) -> bool {
        (action == DeliveryAction::CompleteDelivery
            && order.payment_method == PaymentMethod::Cash)
            || order.payment_status == PaymentStatus::Paid
    }
}
