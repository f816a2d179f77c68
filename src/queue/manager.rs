//! # Queue Manager
//!
//! Lifecycle controller for the queue + worker pair. Explicitly constructed
//! and owned by process startup/shutdown code; there is no global instance,
//! the exactly-once initialization guard is an ordinary state field.

use super::order_queue::OrderQueue;
use crate::error::Result;
use crate::worker::OrderWorkerPool;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct QueueManager {
    queue: Arc<OrderQueue>,
    workers: OrderWorkerPool,
    initialized: bool,
}

impl QueueManager {
    pub fn new(queue: Arc<OrderQueue>, workers: OrderWorkerPool) -> Self {
        Self {
            queue,
            workers,
            initialized: false,
        }
    }

    /// Start the worker pool. A second call is a logged no-op.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            warn!("Queue manager already initialized");
            return Ok(());
        }

        info!("Initializing queue manager");
        self.workers.start();
        self.initialized = true;
        info!("Queue manager initialized");
        Ok(())
    }

    /// Shut down gracefully: workers stop pulling before the queue is
    /// closed. Safe to call when not initialized; cleanup failures are
    /// logged rather than propagated so they cannot mask a primary failure
    /// during teardown.
    pub async fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }

        info!("Shutting down queue manager");
        self.workers.shutdown().await;

        if let Err(e) = self.queue.close().await {
            error!(error = %e, "Failed to close queue during shutdown");
        }

        self.initialized = false;
        info!("Queue manager shut down");
    }

    /// Initialization state, for health checks
    pub fn is_ready(&self) -> bool {
        self.initialized
    }

    pub fn queue(&self) -> &Arc<OrderQueue> {
        &self.queue
    }
}
