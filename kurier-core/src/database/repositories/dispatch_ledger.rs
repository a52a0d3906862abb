use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::ports::dispatch_ledger::DispatchLedger;
use crate::error::{DeliveryError, Result};

/// Postgres-backed dispatch ledger.
///
/// The `dispatch_log` table carries a unique index on
/// `(entity_id, event_name)`; insert races resolve inside the database, so
/// a check-then-insert pair is never needed.
#[derive(Debug, Clone)]
pub struct PostgresDispatchLedger {
    pool: PgPool,
}

impl PostgresDispatchLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DispatchLedger for PostgresDispatchLedger {
    async fn has_dispatched(
        &self,
        entity_id: Uuid,
        event_name: &str,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM dispatch_log
                WHERE entity_id = $1 AND event_name = $2
            )",
        )
        .bind(entity_id)
        .bind(event_name)
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            DeliveryError::Ledger(format!(
                "failed to read dispatch record: {e}"
            ))
        })?;

        Ok(exists)
    }

    async fn mark_dispatched(
        &self,
        entity_id: Uuid,
        event_name: &str,
    ) -> Result<()> {
        // Concurrent inserts for the same pair collapse to one row; the
        // losing caller still reports success.
        sqlx::query(
            "INSERT INTO dispatch_log (entity_id, event_name)
             VALUES ($1, $2)
             ON CONFLICT (entity_id, event_name) DO NOTHING",
        )
        .bind(entity_id)
        .bind(event_name)
        .execute(self.pool())
        .await
        .map_err(|e| {
            DeliveryError::Ledger(format!(
                "failed to record dispatch: {e}"
            ))
        })?;

        Ok(())
    }
}
