//! # Worker Pool
//!
//! Concurrent executors that pull jobs from the work queue, invoke the
//! external execution collaborator, and drive order state transitions with
//! bounded retry. Per-order mutual exclusion comes entirely from the queue's
//! exclusive-delivery contract; across orders the workers run fully
//! concurrently.
//!
//! Side effects are strictly ordered per transition: persistent-store write,
//! then cache update, then notification emission, so a subscriber never
//! observes a status the durable record does not reflect.

use crate::cache::OrderCache;
use crate::error::{OrderflowError, Result};
use crate::events::{NotificationHub, OrderEvent};
use crate::execution::{ExecutionClient, ExecutionFailure, ExecutionOutcome};
use crate::models::{Order, OrderChangeset, StatusUpdate};
use crate::queue::{OrderJob, OrderQueue};
use crate::retry::RetryPolicy;
use crate::state_machine::{OrderStateMachine, OrderStatus};
use crate::store::OrderRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Everything a worker needs to process jobs
pub struct WorkerContext {
    pub queue: Arc<OrderQueue>,
    pub store: Arc<dyn OrderRepository>,
    pub cache: OrderCache,
    pub hub: NotificationHub,
    pub execution: Arc<dyn ExecutionClient>,
    pub retry: RetryPolicy,
}

/// Pool of N concurrent job executors. Concurrency is configuration, not a
/// constant.
pub struct OrderWorkerPool {
    ctx: Arc<WorkerContext>,
    concurrency: usize,
    poll_interval: Duration,
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl OrderWorkerPool {
    pub fn new(ctx: WorkerContext, concurrency: usize, poll_interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            ctx: Arc::new(ctx),
            concurrency,
            poll_interval,
            shutdown,
            handles: Vec::new(),
        }
    }

    /// Spawn the worker tasks. A second call while running is a no-op.
    pub fn start(&mut self) {
        if !self.handles.is_empty() {
            warn!("Worker pool already started");
            return;
        }

        info!(concurrency = self.concurrency, "Starting worker pool");
        for worker_id in 0..self.concurrency {
            let ctx = Arc::clone(&self.ctx);
            let shutdown_rx = self.shutdown.subscribe();
            let poll_interval = self.poll_interval;
            self.handles.push(tokio::spawn(worker_loop(
                worker_id,
                ctx,
                shutdown_rx,
                poll_interval,
            )));
        }
    }

    /// Signal every worker to stop pulling and wait for them to finish
    /// their in-flight job.
    pub async fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }

        info!("Stopping worker pool");
        let _ = self.shutdown.send(true);
        for result in futures::future::join_all(self.handles.drain(..)).await {
            if let Err(e) = result {
                error!(error = %e, "Worker task ended abnormally");
            }
        }
        info!("Worker pool stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }
}

async fn worker_loop(
    worker_id: usize,
    ctx: Arc<WorkerContext>,
    mut shutdown_rx: watch::Receiver<bool>,
    poll_interval: Duration,
) {
    debug!(worker_id, "Worker started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match ctx.queue.next_job().await {
            Ok(Some(job)) => {
                if let Err(e) = process_job(&ctx, &job).await {
                    settle_aborted_job(&ctx, &job, e).await;
                }
            }
            Ok(None) => {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = shutdown_rx.changed() => {}
                }
            }
            Err(e) => {
                warn!(worker_id, error = %e, "Failed to poll queue");
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = shutdown_rx.changed() => {}
                }
            }
        }
    }

    debug!(worker_id, "Worker stopped");
}

/// One attempt at one claimed job
async fn process_job(ctx: &WorkerContext, job: &OrderJob) -> Result<()> {
    debug!(job_id = %job.id, attempt = job.attempts_made, "Processing job");

    let Some(mut order) = ctx.store.find_by_id(&job.id).await? else {
        warn!(job_id = %job.id, "No order record for claimed job");
        ctx.queue.fail_job(&job.id, "order record not found").await?;
        return Ok(());
    };

    // Duplicate-delivery guard: a terminal order means the job is already
    // resolved and must not be re-processed.
    if order.status.is_terminal() {
        debug!(order_id = %order.id, status = %order.status, "Order already resolved, skipping");
        ctx.queue.complete_job(&job.id).await?;
        return Ok(());
    }

    // An interrupted attempt can leave the order mid-stage; the new attempt
    // re-earns every stage from the start.
    if order.status.is_active() {
        warn!(order_id = %order.id, status = %order.status, "Order left mid-stage, resetting");
        order = ctx
            .store
            .update(&order.id, OrderChangeset::status(OrderStatus::Pending))
            .await?;
    }

    advance(
        ctx,
        &mut order,
        OrderStatus::Routing,
        Some("selecting execution venue".to_string()),
        OrderChangeset::default(),
    )
    .await?;

    match ctx.execution.execute(&job.payload).await {
        Ok(outcome) => confirm_order(ctx, &mut order, job, outcome).await,
        Err(failure) => handle_execution_failure(ctx, &mut order, job, failure).await,
    }
}

/// Drive the remaining success-path transitions and settle the job
async fn confirm_order(
    ctx: &WorkerContext,
    order: &mut Order,
    job: &OrderJob,
    outcome: ExecutionOutcome,
) -> Result<()> {
    advance(
        ctx,
        order,
        OrderStatus::Building,
        Some(format!("building transaction via {}", outcome.venue)),
        OrderChangeset::default(),
    )
    .await?;

    advance(
        ctx,
        order,
        OrderStatus::Submitted,
        Some(format!("transaction {} submitted", outcome.tx_ref)),
        OrderChangeset::default(),
    )
    .await?;

    let final_fields = OrderChangeset {
        amount_out: Some(outcome.amount_out),
        executed_price: Some(outcome.executed_price),
        venue: Some(outcome.venue.clone()),
        tx_ref: Some(outcome.tx_ref.clone()),
        ..Default::default()
    };
    advance(
        ctx,
        order,
        OrderStatus::Confirmed,
        Some("execution confirmed".to_string()),
        final_fields,
    )
    .await?;

    ctx.queue.complete_job(&job.id).await?;
    info!(
        order_id = %order.id,
        venue = %outcome.venue,
        tx_ref = %outcome.tx_ref,
        "Order confirmed"
    );
    Ok(())
}

/// Retry with backoff while attempts remain, otherwise fail terminally
async fn handle_execution_failure(
    ctx: &WorkerContext,
    order: &mut Order,
    job: &OrderJob,
    failure: ExecutionFailure,
) -> Result<()> {
    let attempts = job.attempts_made;
    warn!(
        order_id = %order.id,
        attempt = attempts,
        max_attempts = ctx.retry.max_attempts,
        reason = %failure,
        "Execution attempt failed"
    );

    if ctx.retry.is_exhausted(attempts) {
        let update =
            OrderStateMachine::apply(order, OrderStatus::Failed, Some(failure.reason.clone()))?;
        let changeset = OrderChangeset {
            status: Some(OrderStatus::Failed),
            error_message: Some(failure.reason.clone()),
            retry_count: Some(attempts),
            ..Default::default()
        };
        persist_and_notify(ctx, order, changeset, update).await?;
        ctx.queue.fail_job(&job.id, &failure.reason).await?;
        error!(order_id = %order.id, retry_count = attempts, "Order failed terminally");
    } else {
        let update = OrderStateMachine::revert_for_retry(order, attempts)?;
        let changeset = OrderChangeset {
            status: Some(OrderStatus::Pending),
            retry_count: Some(attempts),
            ..Default::default()
        };
        persist_and_notify(ctx, order, changeset, update).await?;

        let delay = ctx.retry.delay_for(attempts.saturating_sub(1) as u32);
        ctx.queue.reschedule_job(&job.id, delay).await?;
        debug!(order_id = %order.id, delay_ms = delay.as_millis() as u64, "Retry scheduled");
    }

    Ok(())
}

/// Apply one forward transition and propagate it through store, cache and
/// fan-out in that order.
async fn advance(
    ctx: &WorkerContext,
    order: &mut Order,
    to: OrderStatus,
    detail: Option<String>,
    mut changeset: OrderChangeset,
) -> Result<()> {
    let update = OrderStateMachine::apply(order, to, detail)?;
    changeset.status = Some(to);
    persist_and_notify(ctx, order, changeset, update).await
}

async fn persist_and_notify(
    ctx: &WorkerContext,
    order: &mut Order,
    changeset: OrderChangeset,
    update: StatusUpdate,
) -> Result<()> {
    let stored = ctx.store.update(&order.id, changeset).await?;
    *order = stored;

    // Cache writes are advisory; the persisted state above is what counts
    ctx.cache.put(order.clone());
    ctx.cache.append_update(&order.id, update.clone());

    ctx.hub.publish(OrderEvent::from_update(&order.id, &update));
    Ok(())
}

/// A job attempt that aborted with an error (infrastructure failure or a
/// state-machine invariant break) still has to be settled with the queue.
async fn settle_aborted_job(ctx: &WorkerContext, job: &OrderJob, e: OrderflowError) {
    error!(
        job_id = %job.id,
        category = e.category(),
        error = %e,
        "Job attempt aborted"
    );

    let settled = match &e {
        // Invariant breaks are never retried into a worse state
        OrderflowError::InvalidTransition(_) => ctx.queue.fail_job(&job.id, &e.to_string()).await,
        _ => {
            if ctx.retry.is_exhausted(job.attempts_made) {
                ctx.queue.fail_job(&job.id, &e.to_string()).await
            } else {
                let delay = ctx.retry.delay_for(job.attempts_made.saturating_sub(1) as u32);
                ctx.queue.reschedule_job(&job.id, delay).await
            }
        }
    };

    if let Err(inner) = settled {
        error!(job_id = %job.id, error = %inner, "Failed to settle aborted job");
    }
}
