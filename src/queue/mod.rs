//! # Work Queue
//!
//! Durable, priority-capable job queue keyed by order id, plus the lifecycle
//! controller that owns the queue/worker pair.

pub mod job;
pub mod manager;
pub mod order_queue;
pub mod postgres;
pub mod store;

pub use job::{JobCounts, JobPayload, JobState, JobStats, OrderJob};
pub use manager::QueueManager;
pub use order_queue::OrderQueue;
pub use postgres::PgJobStore;
pub use store::{JobStore, RetentionPolicy};
