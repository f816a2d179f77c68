#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Orderflow Core
//!
//! Asynchronous order-execution core: accepts execution requests against
//! external trade venues, tracks each through a multi-stage lifecycle, and
//! reliably reports progress to observers.
//!
//! ## Architecture
//!
//! The pipeline is built from small, separately-testable pieces:
//!
//! - [`queue`] - durable, priority-capable work queue keyed by order id,
//!   with idempotent enqueue, pause/resume and retention pruning, plus the
//!   [`queue::QueueManager`] lifecycle controller
//! - [`worker`] - the concurrent executors driving order state transitions
//!   with bounded retry; the sole mutators of order status
//! - [`state_machine`] - the legal status edges and terminal-state guards
//! - [`retry`] - exponential backoff with jitter, separate from state logic
//! - [`cache`] - best-effort mirror of live order state plus the bounded
//!   status-update history
//! - [`events`] - per-order notification fan-out to connected observers
//! - [`services`] - the façade the boundary layer calls (submit, status
//!   lookups, stats)
//! - [`store`] / [`execution`] - trait boundaries to the authoritative
//!   relational store and the opaque venue-execution collaborator
//!
//! Data flow: submit caches the initial snapshot and enqueues a job; a
//! worker claims it exclusively, calls the execution collaborator and walks
//! the order through `PENDING -> ROUTING -> BUILDING -> SUBMITTED ->
//! CONFIRMED` (or `FAILED` after the retry budget), writing store, cache and
//! fan-out in that order at every step.

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod execution;
pub mod logging;
pub mod models;
pub mod queue;
pub mod retry;
pub mod services;
pub mod state_machine;
pub mod store;
pub mod test_helpers;
pub mod worker;

pub use cache::OrderCache;
pub use config::OrderflowConfig;
pub use error::{OrderflowError, Result};
pub use events::{FanoutStats, NotificationHub, OrderEvent, Subscription};
pub use execution::{ExecutionClient, ExecutionFailure, ExecutionOutcome};
pub use models::{Order, OrderChangeset, OrderFilter, OrderKind, OrderParams, StatusUpdate};
pub use queue::{
    JobPayload, JobState, JobStats, OrderJob, OrderQueue, PgJobStore, QueueManager,
    RetentionPolicy,
};
pub use retry::{calculate_backoff, RetryPolicy};
pub use services::{
    JobStatusReport, OrderStatusReport, QueueService, StatusSource, SubmitReceipt,
};
pub use state_machine::{OrderStateMachine, OrderStatus, StateMachineError};
pub use store::{OrderRepository, PgOrderRepository};
pub use worker::{OrderWorkerPool, WorkerContext};
