use std::fmt;
use std::sync::Arc;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::database::ports::customers::CustomerStore;
use crate::database::ports::dispatch_ledger::DispatchLedger;
use crate::database::ports::orders::OrderStore;
use crate::database::repositories::{
    PostgresCustomerStore, PostgresDispatchLedger, PostgresOrderStore,
};
use crate::error::{DeliveryError, Result};

/// Postgres-backed store bundle: owns the pool and hands out the
/// repositories behind their ports.
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
    orders: PostgresOrderStore,
    customers: PostgresCustomerStore,
    ledger: PostgresDispatchLedger,
}

impl fmt::Debug for PostgresDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDatabase")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .finish()
    }
}

impl PostgresDatabase {
    pub async fn new(connection_string: &str) -> Result<Self> {
        // Pool configuration from environment or sensible defaults
        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);

        let min_connections = std::env::var("DB_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(2);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .test_before_acquire(true)
            .connect(connection_string)
            .await
            .map_err(|e| {
                DeliveryError::Database(format!(
                    "database connection failed: {e}"
                ))
            })?;

        info!(
            "Database pool initialized with max_connections={}, min_connections={}",
            max_connections, min_connections
        );

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            DeliveryError::Database(format!("migrations failed: {e}"))
        })?;

        let orders = PostgresOrderStore::new(pool.clone());
        let customers = PostgresCustomerStore::new(pool.clone());
        let ledger = PostgresDispatchLedger::new(pool.clone());

        Ok(PostgresDatabase {
            pool,
            orders,
            customers,
            ledger,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn orders(&self) -> Arc<dyn OrderStore> {
        Arc::new(self.orders.clone())
    }

    pub fn customers(&self) -> Arc<dyn CustomerStore> {
        Arc::new(self.customers.clone())
    }

    pub fn ledger(&self) -> Arc<dyn DispatchLedger> {
        Arc::new(self.ledger.clone())
    }
}
