//! # Persistent Store Boundary
//!
//! The relational store is the system of record for orders; the cache is
//! only a derived mirror. The core consumes the store through the
//! [`OrderRepository`] trait and treats it as authoritative whenever the
//! cache is absent or inconsistent. Schema and migrations are owned by the
//! surrounding deployment, not by this crate.

pub mod postgres;

use crate::error::Result;
use crate::models::{Order, OrderChangeset, OrderFilter};
use async_trait::async_trait;

pub use postgres::PgOrderRepository;

/// Authoritative order storage
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert a new order record
    async fn create(&self, order: &Order) -> Result<()>;

    /// Fetch one order by id
    async fn find_by_id(&self, id: &str) -> Result<Option<Order>>;

    /// List orders matching the filter, newest first
    async fn find_all(&self, filter: &OrderFilter, limit: i64, offset: i64) -> Result<Vec<Order>>;

    /// Count orders matching the filter
    async fn count(&self, filter: &OrderFilter) -> Result<i64>;

    /// Apply a partial update and return the stored row
    async fn update(&self, id: &str, changeset: OrderChangeset) -> Result<Order>;
}
