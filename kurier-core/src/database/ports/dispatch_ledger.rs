use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// Durable at-most-once marker for (entity, event) analytics sends.
///
/// Existence of a record means the event already went out. Records are
/// only ever inserted, never updated or deleted by this subsystem.
#[async_trait]
pub trait DispatchLedger: Send + Sync {
    /// Whether `event_name` has already been sent for the entity.
    async fn has_dispatched(
        &self,
        entity_id: Uuid,
        event_name: &str,
    ) -> Result<bool>;

    /// Record that `event_name` was sent for the entity.
    ///
    /// Safe to call concurrently for the same pair: exactly one record is
    /// kept and every caller observes success.
    async fn mark_dispatched(
        &self,
        entity_id: Uuid,
        event_name: &str,
    ) -> Result<()>;
}
