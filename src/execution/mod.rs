//! # Execution Collaborator Boundary
//!
//! The system that actually performs venue routing and settlement is opaque
//! to this core: workers hand it the order parameters and consume only the
//! success/failure outcome. Implementations are expected to enforce their own
//! call timeout; a stuck call consumes the worker slot for that job's retry
//! budget.

use crate::queue::JobPayload;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Successful execution outcome reported by the venue collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// The venue that filled the order
    pub venue: String,
    /// Price the order executed at
    pub executed_price: Decimal,
    /// Output amount received
    pub amount_out: Decimal,
    /// Settlement transaction reference
    pub tx_ref: String,
}

/// Failure reason from the execution collaborator. Treated as retryable
/// until the attempt ceiling converts it into a terminal failure.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct ExecutionFailure {
    pub reason: String,
}

impl ExecutionFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Contract the worker pool holds against the external execution system
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Route and execute the order described by the payload
    async fn execute(&self, payload: &JobPayload) -> Result<ExecutionOutcome, ExecutionFailure>;
}
