//! # Queue Service
//!
//! Thin orchestration façade composing the cache, the work queue and the
//! persistent store into the operations the boundary layer needs. Failures
//! from the underlying collaborators propagate unchanged; this layer adds
//! no new error semantics.

use crate::cache::OrderCache;
use crate::error::{OrderflowError, Result};
use crate::models::{Order, OrderParams, StatusUpdate};
use crate::queue::{JobPayload, JobState, JobStats, OrderQueue};
use crate::state_machine::OrderStatus;
use crate::store::OrderRepository;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Which layer answered a status read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    Cache,
    Store,
}

impl fmt::Display for StatusSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Store => write!(f, "store"),
        }
    }
}

/// Accepted submission: the ids a caller needs to follow progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub order_id: String,
    pub job_id: String,
    pub status: OrderStatus,
}

/// Current order state plus the layer that served it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusReport {
    pub order: Order,
    pub source: StatusSource,
}

/// Projection of a queue job into a status payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub id: String,
    pub state: JobState,
    pub attempts_made: i32,
    pub priority: i32,
    pub payload: JobPayload,
    pub enqueued_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
}

/// High-level service for queue operations
pub struct QueueService {
    queue: Arc<OrderQueue>,
    cache: OrderCache,
    store: Arc<dyn OrderRepository>,
}

impl QueueService {
    pub fn new(queue: Arc<OrderQueue>, cache: OrderCache, store: Arc<dyn OrderRepository>) -> Self {
        Self {
            queue,
            cache,
            store,
        }
    }

    /// Submit an order for processing under a generated id
    pub async fn submit_order(&self, params: OrderParams) -> Result<SubmitReceipt> {
        self.submit_order_with_id(Uuid::new_v4().to_string(), params)
            .await
    }

    /// Submit an order under a caller-supplied id. Resubmitting an id is
    /// absorbed by the queue's idempotent enqueue.
    pub async fn submit_order_with_id(
        &self,
        order_id: String,
        params: OrderParams,
    ) -> Result<SubmitReceipt> {
        params.validate()?;

        let order = match self.store.find_by_id(&order_id).await? {
            Some(existing) => {
                warn!(order_id = %order_id, "Order already recorded, re-submitting its job");
                existing
            }
            None => {
                let order = Order::new(order_id.clone(), params.clone());
                self.store.create(&order).await?;
                order
            }
        };

        // Cache before enqueue: a worker must never finish ahead of the
        // pending snapshot becoming visible.
        self.cache.put(order.clone());
        self.cache.append_update(
            &order.id,
            StatusUpdate {
                status: order.status,
                timestamp: order.created_at,
                detail: Some("order accepted".to_string()),
            },
        );

        let priority = params.priority;
        let job = self
            .queue
            .enqueue(JobPayload::new(order.id.clone(), params), priority)
            .await?;

        info!(order_id = %order.id, job_id = %job.id, "Order submitted to queue");
        Ok(SubmitReceipt {
            order_id: order.id,
            job_id: job.id,
            status: OrderStatus::Pending,
        })
    }

    /// Current order state: cache first, authoritative store on a miss
    pub async fn get_order_status(&self, order_id: &str) -> Result<OrderStatusReport> {
        if let Some(order) = self.cache.get(order_id) {
            return Ok(OrderStatusReport {
                order,
                source: StatusSource::Cache,
            });
        }

        match self.store.find_by_id(order_id).await? {
            Some(order) => Ok(OrderStatusReport {
                order,
                source: StatusSource::Store,
            }),
            None => Err(OrderflowError::not_found("order", order_id)),
        }
    }

    /// Project a queue job into a status payload
    pub async fn get_job_status(&self, job_id: &str) -> Result<JobStatusReport> {
        let job = self
            .queue
            .get_job(job_id)
            .await?
            .ok_or_else(|| OrderflowError::not_found("job", job_id))?;

        Ok(JobStatusReport {
            id: job.id,
            state: job.state,
            attempts_made: job.attempts_made,
            priority: job.priority,
            payload: job.payload,
            enqueued_at: job.enqueued_at,
            scheduled_at: job.scheduled_at,
        })
    }

    /// Aggregate queue statistics
    pub async fn get_stats(&self) -> Result<JobStats> {
        self.queue.stats().await
    }

    /// Cached status-update history for an order
    pub fn get_order_updates(&self, order_id: &str) -> Vec<StatusUpdate> {
        self.cache.get_updates(order_id)
    }
}
