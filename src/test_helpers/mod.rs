//! Test doubles for exercising the pipeline without external services: an
//! in-memory job store, an in-memory order repository and a scriptable
//! execution client. Used by unit tests and the integration suite.

use crate::error::{OrderflowError, Result};
use crate::execution::{ExecutionClient, ExecutionFailure, ExecutionOutcome};
use crate::models::{Order, OrderChangeset, OrderFilter};
use crate::queue::{JobCounts, JobState, OrderJob};
use crate::queue::store::{JobStore, RetentionPolicy};
use crate::store::OrderRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// In-memory [`JobStore`] with the same claim/retention semantics as the
/// PostgreSQL implementation.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, OrderJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: OrderJob) -> Result<OrderJob> {
        let mut jobs = self.jobs.write();
        Ok(jobs.entry(job.id.clone()).or_insert(job).clone())
    }

    async fn get(&self, id: &str) -> Result<Option<OrderJob>> {
        Ok(self.jobs.read().get(id).cloned())
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<OrderJob>> {
        let mut jobs = self.jobs.write();

        let next_id = jobs
            .values()
            .filter(|job| job.is_ready(now))
            .min_by_key(|job| (Reverse(job.priority), job.enqueued_at))
            .map(|job| job.id.clone());

        Ok(next_id.map(|id| {
            let job = jobs.get_mut(&id).expect("job disappeared under write lock");
            job.state = JobState::Active;
            job.attempts_made += 1;
            job.clone()
        }))
    }

    async fn mark_completed(&self, id: &str) -> Result<()> {
        if let Some(job) = self.jobs.write().get_mut(id) {
            job.state = JobState::Completed;
            job.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        if let Some(job) = self.jobs.write().get_mut(id) {
            job.state = JobState::Failed;
            job.last_error = Some(error.to_string());
            job.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn reschedule(&self, id: &str, run_at: DateTime<Utc>) -> Result<()> {
        if let Some(job) = self.jobs.write().get_mut(id) {
            job.state = JobState::Delayed;
            job.scheduled_at = run_at;
        }
        Ok(())
    }

    async fn counts(&self) -> Result<JobCounts> {
        let jobs = self.jobs.read();
        let mut counts = JobCounts::default();
        for job in jobs.values() {
            match job.state {
                JobState::Waiting => counts.waiting += 1,
                JobState::Active => counts.active += 1,
                JobState::Delayed => counts.delayed += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn prune(&self, policy: &RetentionPolicy, now: DateTime<Utc>) -> Result<u64> {
        let mut jobs = self.jobs.write();
        let mut removed = 0u64;

        for (state, max_age, max_count) in [
            (
                JobState::Completed,
                policy.completed_max_age,
                policy.completed_max_count,
            ),
            (
                JobState::Failed,
                policy.failed_max_age,
                policy.failed_max_count,
            ),
        ] {
            let cutoff = now - max_age;
            let aged_out: Vec<String> = jobs
                .values()
                .filter(|job| {
                    job.state == state && job.finished_at.map(|at| at < cutoff).unwrap_or(false)
                })
                .map(|job| job.id.clone())
                .collect();
            for id in aged_out {
                jobs.remove(&id);
                removed += 1;
            }

            let mut finished: Vec<(String, Option<DateTime<Utc>>)> = jobs
                .values()
                .filter(|job| job.state == state)
                .map(|job| (job.id.clone(), job.finished_at))
                .collect();
            finished.sort_by(|a, b| b.1.cmp(&a.1));
            for (id, _) in finished.into_iter().skip(max_count as usize) {
                jobs.remove(&id);
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory [`OrderRepository`]
#[derive(Default)]
pub struct MemoryOrderRepository {
    orders: RwLock<HashMap<String, Order>>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn create(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write();
        if orders.contains_key(&order.id) {
            return Err(OrderflowError::infrastructure(
                "create_order",
                format!("duplicate key: {}", order.id),
            ));
        }
        orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Order>> {
        Ok(self.orders.read().get(id).cloned())
    }

    async fn find_all(&self, filter: &OrderFilter, limit: i64, offset: i64) -> Result<Vec<Order>> {
        let orders = self.orders.read();
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|order| filter.status.map(|s| order.status == s).unwrap_or(true))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self, filter: &OrderFilter) -> Result<i64> {
        let orders = self.orders.read();
        Ok(orders
            .values()
            .filter(|order| filter.status.map(|s| order.status == s).unwrap_or(true))
            .count() as i64)
    }

    async fn update(&self, id: &str, changeset: OrderChangeset) -> Result<Order> {
        let mut orders = self.orders.write();
        let order = orders
            .get_mut(id)
            .ok_or_else(|| OrderflowError::not_found("order", id))?;

        if let Some(status) = changeset.status {
            order.status = status;
        }
        if let Some(amount_out) = changeset.amount_out {
            order.amount_out = Some(amount_out);
        }
        if let Some(executed_price) = changeset.executed_price {
            order.executed_price = Some(executed_price);
        }
        if let Some(venue) = changeset.venue {
            order.venue = Some(venue);
        }
        if let Some(tx_ref) = changeset.tx_ref {
            order.tx_ref = Some(tx_ref);
        }
        if let Some(error_message) = changeset.error_message {
            order.error_message = Some(error_message);
        }
        if let Some(retry_count) = changeset.retry_count {
            order.retry_count = retry_count;
        }
        order.updated_at = Utc::now();

        Ok(order.clone())
    }
}

/// Scriptable [`ExecutionClient`]: pops scripted outcomes first, then keeps
/// returning the fallback. Records how many times it was called.
pub struct StubExecutionClient {
    script: Mutex<VecDeque<std::result::Result<ExecutionOutcome, ExecutionFailure>>>,
    fallback: std::result::Result<ExecutionOutcome, ExecutionFailure>,
    calls: AtomicUsize,
}

impl StubExecutionClient {
    /// Every call succeeds with a fresh transaction reference
    pub fn succeeding() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(default_outcome()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails with the given reason
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Err(ExecutionFailure::new(reason)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Scripted outcomes consumed in order before the fallback applies
    pub fn with_script(
        script: Vec<std::result::Result<ExecutionOutcome, ExecutionFailure>>,
        fallback: std::result::Result<ExecutionOutcome, ExecutionFailure>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times `execute` ran
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn default_outcome() -> ExecutionOutcome {
    ExecutionOutcome {
        venue: "venue-alpha".to_string(),
        executed_price: Decimal::new(9950, 2),
        amount_out: Decimal::new(995, 0),
        tx_ref: format!("tx-{}", Uuid::new_v4()),
    }
}

#[async_trait]
impl ExecutionClient for StubExecutionClient {
    async fn execute(
        &self,
        _payload: &crate::queue::JobPayload,
    ) -> std::result::Result<ExecutionOutcome, ExecutionFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.script.lock().pop_front() {
            return next;
        }
        match &self.fallback {
            Ok(outcome) => Ok(ExecutionOutcome {
                tx_ref: format!("tx-{}", Uuid::new_v4()),
                ..outcome.clone()
            }),
            Err(failure) => Err(failure.clone()),
        }
    }
}
