//! # Order Queue
//!
//! Durable, priority-capable job queue keyed by order id. Enqueue is
//! idempotent on the key, dispatch can be paused without losing jobs, and
//! finished jobs are pruned automatically under the retention policy.

use super::job::{JobPayload, JobStats, OrderJob};
use super::store::{JobStore, RetentionPolicy};
use crate::error::{OrderflowError, Result};
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Work queue façade over a [`JobStore`]
pub struct OrderQueue {
    store: Arc<dyn JobStore>,
    retention: RetentionPolicy,
    paused: AtomicBool,
    closed: AtomicBool,
}

impl OrderQueue {
    pub fn new(store: Arc<dyn JobStore>, retention: RetentionPolicy) -> Self {
        Self {
            store,
            retention,
            paused: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Add an order to the queue. Idempotent on the order id: when a job
    /// with that key already exists it is returned unchanged instead of
    /// creating a duplicate.
    pub async fn enqueue(&self, payload: JobPayload, priority: i32) -> Result<OrderJob> {
        if self.is_closed() {
            return Err(OrderflowError::infrastructure("enqueue", "queue is closed"));
        }

        let order_id = payload.order_id.clone();
        let job = self.store.insert(OrderJob::new(payload, priority)).await?;

        info!(order_id = %order_id, job_id = %job.id, priority, "Order added to queue");
        Ok(job)
    }

    /// Fetch a job by id
    pub async fn get_job(&self, id: &str) -> Result<Option<OrderJob>> {
        self.store.get(id).await
    }

    /// Aggregate queue statistics; `total` is the exact sum of the per-state
    /// counts at the instant of the read.
    pub async fn stats(&self) -> Result<JobStats> {
        Ok(JobStats::from(self.store.counts().await?))
    }

    /// Claim the next dispatchable job. Returns `None` while paused or
    /// closed, and when nothing is ready.
    pub async fn next_job(&self) -> Result<Option<OrderJob>> {
        if self.is_paused() || self.is_closed() {
            return Ok(None);
        }
        self.store.claim_next(Utc::now()).await
    }

    /// Finish a claimed job successfully and apply retention pruning
    pub async fn complete_job(&self, id: &str) -> Result<()> {
        self.store.mark_completed(id).await?;
        self.store.prune(&self.retention, Utc::now()).await?;
        debug!(job_id = %id, "Job completed");
        Ok(())
    }

    /// Finish a claimed job as terminally failed and apply retention pruning
    pub async fn fail_job(&self, id: &str, error: &str) -> Result<()> {
        self.store.mark_failed(id, error).await?;
        self.store.prune(&self.retention, Utc::now()).await?;
        debug!(job_id = %id, error, "Job failed");
        Ok(())
    }

    /// Return a claimed job for a later attempt
    pub async fn reschedule_job(&self, id: &str, delay: std::time::Duration) -> Result<()> {
        let run_at = Utc::now()
            + Duration::from_std(delay)
                .map_err(|e| OrderflowError::infrastructure("reschedule", e.to_string()))?;
        self.store.reschedule(id, run_at).await?;
        debug!(job_id = %id, delay_ms = delay.as_millis() as u64, "Job rescheduled");
        Ok(())
    }

    /// Stop dispatching new jobs. Queued and in-flight jobs are untouched.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        info!("Queue paused");
    }

    /// Resume dispatching
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        info!("Queue resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Prune history outside the given ages (counts come from the standing
    /// retention policy). Active and waiting jobs are never affected.
    pub async fn clean(
        &self,
        older_than_completed: std::time::Duration,
        older_than_failed: std::time::Duration,
    ) -> Result<u64> {
        let policy = RetentionPolicy {
            completed_max_age: Duration::from_std(older_than_completed)
                .map_err(|e| OrderflowError::infrastructure("clean", e.to_string()))?,
            failed_max_age: Duration::from_std(older_than_failed)
                .map_err(|e| OrderflowError::infrastructure("clean", e.to_string()))?,
            ..self.retention.clone()
        };
        let removed = self.store.prune(&policy, Utc::now()).await?;
        info!(removed, "Queue cleaned");
        Ok(removed)
    }

    /// Close the queue. Dispatch stops; already-persisted job state
    /// survives in the durable store.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.store.close().await?;
        info!("Queue closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
