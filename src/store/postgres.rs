//! PostgreSQL-backed order repository over sqlx.
//!
//! Status and kind travel as text columns and are parsed into their enums at
//! this edge, so a corrupt row surfaces as an infrastructure error instead of
//! leaking strings into the domain.

use super::OrderRepository;
use crate::error::{OrderflowError, Result};
use crate::models::{Order, OrderChangeset, OrderFilter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::debug;

const ORDER_COLUMNS: &str = "id, token_in, token_out, amount_in, slippage, kind, status, \
     amount_out, executed_price, venue, tx_ref, error_message, retry_count, created_at, updated_at";

/// Raw database row; converted into [`Order`] at the boundary
#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    token_in: String,
    token_out: String,
    amount_in: Decimal,
    slippage: Decimal,
    kind: String,
    status: String,
    amount_out: Option<Decimal>,
    executed_price: Option<Decimal>,
    venue: Option<String>,
    tx_ref: Option<String>,
    error_message: Option<String>,
    retry_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = OrderflowError;

    fn try_from(row: OrderRow) -> Result<Order> {
        let status = row
            .status
            .parse()
            .map_err(|e: String| OrderflowError::infrastructure("decode_order", e))?;
        let kind = row
            .kind
            .parse()
            .map_err(|e: String| OrderflowError::infrastructure("decode_order", e))?;

        Ok(Order {
            id: row.id,
            token_in: row.token_in,
            token_out: row.token_out,
            amount_in: row.amount_in,
            slippage: row.slippage,
            kind,
            status,
            amount_out: row.amount_out,
            executed_price: row.executed_price,
            venue: row.venue,
            tx_ref: row.tx_ref,
            error_message: row.error_message,
            retry_count: row.retry_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Order repository over a shared PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(&self, order: &Order) -> Result<()> {
        sqlx::query(
            "INSERT INTO orders \
             (id, token_in, token_out, amount_in, slippage, kind, status, retry_count, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&order.id)
        .bind(&order.token_in)
        .bind(&order.token_out)
        .bind(order.amount_in)
        .bind(order.slippage)
        .bind(order.kind.to_string())
        .bind(order.status.to_string())
        .bind(order.retry_count)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(order_id = %order.id, "Order record created");
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn find_all(&self, filter: &OrderFilter, limit: i64, offset: i64) -> Result<Vec<Order>> {
        let rows = match filter.status {
            Some(status) => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 \
                     ORDER BY created_at DESC LIMIT $2 OFFSET $3"
                ))
                .bind(status.to_string())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders \
                     ORDER BY created_at DESC LIMIT $1 OFFSET $2"
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn count(&self, filter: &OrderFilter) -> Result<i64> {
        let count: (i64,) = match filter.status {
            Some(status) => {
                sqlx::query_as("SELECT COUNT(*) FROM orders WHERE status = $1")
                    .bind(status.to_string())
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM orders")
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        Ok(count.0)
    }

    async fn update(&self, id: &str, changeset: OrderChangeset) -> Result<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET \
               status = COALESCE($2, status), \
               amount_out = COALESCE($3, amount_out), \
               executed_price = COALESCE($4, executed_price), \
               venue = COALESCE($5, venue), \
               tx_ref = COALESCE($6, tx_ref), \
               error_message = COALESCE($7, error_message), \
               retry_count = COALESCE($8, retry_count), \
               updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(changeset.status.map(|s| s.to_string()))
        .bind(changeset.amount_out)
        .bind(changeset.executed_price)
        .bind(changeset.venue)
        .bind(changeset.tx_ref)
        .bind(changeset.error_message)
        .bind(changeset.retry_count)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| OrderflowError::not_found("order", id))?;

        Order::try_from(row)
    }
}
