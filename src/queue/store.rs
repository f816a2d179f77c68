//! Storage seam for the durable work queue.
//!
//! The queue's semantics (idempotent keyed enqueue, exclusive claim,
//! retention pruning) are expressed against this trait; production uses the
//! PostgreSQL implementation, tests run the in-memory one from
//! `test_helpers`.

use super::job::{JobCounts, OrderJob};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// Retention bounds for finished jobs. Failed jobs are kept longer than
/// completed ones so operators can inspect what went wrong.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub completed_max_count: i64,
    pub completed_max_age: Duration,
    pub failed_max_count: i64,
    pub failed_max_age: Duration,
}

impl RetentionPolicy {
    pub fn new(
        completed_max_count: i64,
        completed_max_age: Duration,
        failed_max_count: i64,
        failed_max_age: Duration,
    ) -> Self {
        Self {
            completed_max_count,
            completed_max_age,
            failed_max_count,
            failed_max_age,
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            completed_max_count: 100,
            completed_max_age: Duration::hours(1),
            failed_max_count: 50,
            failed_max_age: Duration::hours(2),
        }
    }
}

/// Durable job storage
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert the job unless one with the same key already exists; the
    /// stored job is returned either way (idempotent keyed enqueue).
    async fn insert(&self, job: OrderJob) -> Result<OrderJob>;

    /// Fetch one job by key
    async fn get(&self, id: &str) -> Result<Option<OrderJob>>;

    /// Claim the next dispatchable job exclusively: highest priority first,
    /// oldest first within a priority. The claimed job moves to `Active`
    /// with its attempt counter incremented. At most one holder sees a
    /// given job at a time.
    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<OrderJob>>;

    /// Mark a claimed job as successfully finished
    async fn mark_completed(&self, id: &str) -> Result<()>;

    /// Mark a claimed job as terminally failed
    async fn mark_failed(&self, id: &str, error: &str) -> Result<()>;

    /// Return a claimed job to the delayed state for a later attempt
    async fn reschedule(&self, id: &str, run_at: DateTime<Utc>) -> Result<()>;

    /// Per-state job counts
    async fn counts(&self) -> Result<JobCounts>;

    /// Delete finished jobs outside the retention policy; waiting, delayed
    /// and active jobs are never touched. Returns how many were removed.
    async fn prune(&self, policy: &RetentionPolicy, now: DateTime<Utc>) -> Result<u64>;

    /// Release storage resources. Already-persisted job state must survive.
    async fn close(&self) -> Result<()>;
}
