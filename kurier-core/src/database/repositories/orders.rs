use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use kurier_model::{
    CalorieTier, NewOrder, Order, OrderId, OrderStatus, PaymentMethod,
    PaymentStatus,
};

use crate::database::ports::orders::{
    OrderFilter, OrderStore, TransitionUpdate,
};
use crate::error::{DeliveryError, Result};

/// Advisory lock key serializing order-number assignment across
/// concurrent creators.
const ORDER_NUMBER_LOCK: i64 = 0x6b75_7269_6572;

const ORDER_COLUMNS: &str = "id, order_number, customer_id, assignee_id, \
     delivery_date, delivery_time, quantity, calorie_tier, payment_status, \
     payment_method, prepaid, status, created_at, delivered_at";

#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: OrderRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::from(row.id),
            number: row.order_number,
            customer_id: row.customer_id.into(),
            assignee_id: row.assignee_id,
            delivery_date: row.delivery_date,
            delivery_time: row.delivery_time,
            quantity: row.quantity,
            calorie_tier: CalorieTier::from_str(&row.calorie_tier)
                .map_err(|e| DeliveryError::Database(e.to_string()))?,
            payment_status: PaymentStatus::from_str(&row.payment_status)
                .map_err(|e| DeliveryError::Database(e.to_string()))?,
            payment_method: PaymentMethod::from_str(&row.payment_method)
                .map_err(|e| DeliveryError::Database(e.to_string()))?,
            prepaid: row.prepaid,
            status: OrderStatus::from_str(&row.status)
                .map_err(|e| DeliveryError::Database(e.to_string()))?,
            created_at: row.created_at,
            delivered_at: row.delivered_at,
        })
    }

    fn push_filter(
        builder: &mut sqlx::QueryBuilder<'_, sqlx::Postgres>,
        filter: &OrderFilter,
    ) {
        if let Some(customer_id) = filter.customer_id {
            builder.push(" AND customer_id = ");
            builder.push_bind(customer_id.to_uuid());
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ");
            builder.push_bind(status.as_str());
        }
        if let Some(date) = filter.delivery_date {
            builder.push(" AND delivery_date = ");
            builder.push_bind(date);
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: i64,
    customer_id: Uuid,
    assignee_id: Uuid,
    delivery_date: Option<NaiveDate>,
    delivery_time: NaiveTime,
    quantity: i32,
    calorie_tier: String,
    payment_status: String,
    payment_method: String,
    prepaid: bool,
    status: String,
    created_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn find_max_order_number(&self) -> Result<i64> {
        let max: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(order_number), 0) FROM orders",
        )
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            DeliveryError::Database(format!(
                "failed to read max order number: {e}"
            ))
        })?;

        Ok(max)
    }

    async fn create(&self, order: NewOrder) -> Result<Order> {
        let mut tx = self.pool().begin().await.map_err(|e| {
            DeliveryError::Database(format!(
                "failed to open order transaction: {e}"
            ))
        })?;

        // Number assignment recomputes MAX + 1 per insertion; the advisory
        // lock serializes creators racing within the same instant.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(ORDER_NUMBER_LOCK)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DeliveryError::Database(format!(
                    "failed to lock order sequence: {e}"
                ))
            })?;

        let sql = format!(
            "INSERT INTO orders (
                id, order_number, customer_id, assignee_id, delivery_date,
                delivery_time, quantity, calorie_tier, payment_status,
                payment_method, prepaid, status
            )
            VALUES (
                $1,
                (SELECT COALESCE(MAX(order_number), 0) + 1 FROM orders),
                $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending'
            )
            RETURNING {ORDER_COLUMNS}"
        );

        let row: OrderRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(order.customer_id.to_uuid())
            .bind(order.assignee_id)
            .bind(order.delivery_date)
            .bind(order.delivery_time)
            .bind(order.quantity)
            .bind(order.calorie_tier.as_str())
            .bind(order.payment_status.as_str())
            .bind(order.payment_method.as_str())
            .bind(order.prepaid)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                DeliveryError::Database(format!("failed to create order: {e}"))
            })?;

        tx.commit().await.map_err(|e| {
            DeliveryError::Database(format!(
                "failed to commit order creation: {e}"
            ))
        })?;

        Self::map_row(row)
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id.to_uuid())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| {
                DeliveryError::Database(format!("failed to load order: {e}"))
            })?;

        row.map(Self::map_row).transpose()
    }

    async fn transition(
        &self,
        id: OrderId,
        expected: OrderStatus,
        update: TransitionUpdate,
    ) -> Result<Option<Order>> {
        let sql = format!(
            "UPDATE orders
             SET status = $2,
                 assignee_id = COALESCE($3, assignee_id),
                 delivered_at = COALESCE($4, delivered_at)
             WHERE id = $1 AND status = $5
             RETURNING {ORDER_COLUMNS}"
        );

        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id.to_uuid())
            .bind(update.status.as_str())
            .bind(update.assignee_id)
            .bind(update.delivered_at)
            .bind(expected.as_str())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| {
                DeliveryError::Database(format!(
                    "failed to transition order: {e}"
                ))
            })?;

        row.map(Self::map_row).transpose()
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let mut builder = sqlx::QueryBuilder::new(format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE TRUE"
        ));
        Self::push_filter(&mut builder, filter);
        builder.push(" ORDER BY order_number");

        let rows: Vec<OrderRow> = builder
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(|e| {
                DeliveryError::Database(format!("failed to list orders: {e}"))
            })?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn count(&self, filter: &OrderFilter) -> Result<u64> {
        let mut builder = sqlx::QueryBuilder::new(
            "SELECT COUNT(*) FROM orders WHERE TRUE",
        );
        Self::push_filter(&mut builder, filter);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(|e| {
                DeliveryError::Database(format!("failed to count orders: {e}"))
            })?;

        Ok(count.max(0) as u64)
    }
}
