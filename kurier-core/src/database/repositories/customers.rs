use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use kurier_model::{CalorieTier, Customer, CustomerId, DeliveryPattern};

use crate::database::ports::customers::CustomerStore;
use crate::error::{DeliveryError, Result};

const CUSTOMER_COLUMNS: &str = "id, name, address, calorie_tier, pattern, \
     is_active, created_at, last_checked_at";

#[derive(Debug, Clone)]
pub struct PostgresCustomerStore {
    pool: PgPool,
}

impl PostgresCustomerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: CustomerRow) -> Result<Customer> {
        Ok(Customer {
            id: CustomerId::from(row.id),
            name: row.name,
            address: row.address,
            calorie_tier: CalorieTier::from_str(&row.calorie_tier)
                .map_err(|e| DeliveryError::Database(e.to_string()))?,
            pattern: row.pattern.map(|Json(pattern)| pattern),
            is_active: row.is_active,
            created_at: row.created_at,
            last_checked_at: row.last_checked_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    name: String,
    address: String,
    calorie_tier: String,
    pattern: Option<Json<DeliveryPattern>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_checked_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl CustomerStore for PostgresCustomerStore {
    async fn list_active(&self) -> Result<Vec<Customer>> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers
             WHERE is_active
             ORDER BY created_at"
        );
        let rows: Vec<CustomerRow> = sqlx::query_as(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(|e| {
                DeliveryError::Database(format!(
                    "failed to list active customers: {e}"
                ))
            })?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn find(&self, id: CustomerId) -> Result<Option<Customer>> {
        let sql =
            format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1");
        let row: Option<CustomerRow> = sqlx::query_as(&sql)
            .bind(id.to_uuid())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| {
                DeliveryError::Database(format!(
                    "failed to load customer: {e}"
                ))
            })?;

        row.map(Self::map_row).transpose()
    }

    async fn create(&self, customer: Customer) -> Result<Customer> {
        let sql = format!(
            "INSERT INTO customers (
                id, name, address, calorie_tier, pattern, is_active,
                created_at, last_checked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CUSTOMER_COLUMNS}"
        );

        let row: CustomerRow = sqlx::query_as(&sql)
            .bind(customer.id.to_uuid())
            .bind(&customer.name)
            .bind(&customer.address)
            .bind(customer.calorie_tier.as_str())
            .bind(customer.pattern.map(Json))
            .bind(customer.is_active)
            .bind(customer.created_at)
            .bind(customer.last_checked_at)
            .fetch_one(self.pool())
            .await
            .map_err(|e| {
                DeliveryError::Database(format!(
                    "failed to create customer: {e}"
                ))
            })?;

        Self::map_row(row)
    }

    async fn update(&self, customer: &Customer) -> Result<()> {
        sqlx::query(
            "UPDATE customers
             SET name = $2,
                 address = $3,
                 calorie_tier = $4,
                 pattern = $5,
                 is_active = $6
             WHERE id = $1",
        )
        .bind(customer.id.to_uuid())
        .bind(&customer.name)
        .bind(&customer.address)
        .bind(customer.calorie_tier.as_str())
        .bind(customer.pattern.map(Json))
        .bind(customer.is_active)
        .execute(self.pool())
        .await
        .map_err(|e| {
            DeliveryError::Database(format!("failed to update customer: {e}"))
        })?;

        Ok(())
    }

    async fn touch_last_check(
        &self,
        id: CustomerId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE customers SET last_checked_at = $2 WHERE id = $1")
            .bind(id.to_uuid())
            .bind(at)
            .execute(self.pool())
            .await
            .map_err(|e| {
                DeliveryError::Database(format!(
                    "failed to update customer last check: {e}"
                ))
            })?;

        Ok(())
    }
}
