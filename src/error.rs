//! # Error Types
//!
//! Crate-wide error taxonomy using thiserror for structured error types
//! instead of `Box<dyn Error>` patterns. Every error carries a stable
//! category for machine consumers plus a human-readable message.

use crate::state_machine::StateMachineError;
use thiserror::Error;

/// Errors surfaced by the order execution pipeline
#[derive(Error, Debug)]
pub enum OrderflowError {
    /// Malformed or out-of-range order parameters. Rejected before enqueue,
    /// never retried.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// External execution call failed and is eligible for retry until the
    /// attempt ceiling converts it into a terminal failure on the order.
    #[error("Execution failed: {reason}")]
    TransientExecution { reason: String },

    /// State machine contract violated. Internal invariant break; aborts the
    /// in-flight job attempt rather than coercing state.
    #[error(transparent)]
    InvalidTransition(#[from] StateMachineError),

    /// Queue, cache, or store unreachable.
    #[error("Infrastructure error: {operation}: {message}")]
    Infrastructure { operation: String, message: String },

    /// Requested entity does not exist.
    #[error("Not found: {entity} {id}")]
    NotFound { entity: &'static str, id: String },

    /// Malformed environment or configuration value.
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl OrderflowError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a transient execution failure
    pub fn transient_execution(reason: impl Into<String>) -> Self {
        Self::TransientExecution {
            reason: reason.into(),
        }
    }

    /// Create an infrastructure error
    pub fn infrastructure(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Infrastructure {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Stable failure category for user-visible responses
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::TransientExecution { .. } => "execution_failure",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Infrastructure { .. } => "infrastructure_error",
            Self::NotFound { .. } => "not_found",
            Self::Configuration { .. } => "configuration_error",
        }
    }

    /// Whether a retry may resolve this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientExecution { .. })
    }
}

impl From<sqlx::Error> for OrderflowError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => {
                OrderflowError::infrastructure("query", "no rows returned")
            }
            sqlx::Error::PoolTimedOut => {
                OrderflowError::infrastructure("database_pool", "connection acquire timed out")
            }
            sqlx::Error::PoolClosed => {
                OrderflowError::infrastructure("database_pool", "pool is closed")
            }
            other => OrderflowError::infrastructure("database", other.to_string()),
        }
    }
}

impl From<serde_json::Error> for OrderflowError {
    fn from(err: serde_json::Error) -> Self {
        OrderflowError::infrastructure("serialization", err.to_string())
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, OrderflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = OrderflowError::validation("amount must be positive");
        assert!(matches!(err, OrderflowError::Validation { .. }));

        let err = OrderflowError::infrastructure("enqueue", "connection refused");
        assert!(matches!(err, OrderflowError::Infrastructure { .. }));
    }

    #[test]
    fn test_categories_are_stable() {
        assert_eq!(
            OrderflowError::validation("x").category(),
            "validation_error"
        );
        assert_eq!(
            OrderflowError::transient_execution("x").category(),
            "execution_failure"
        );
        assert_eq!(
            OrderflowError::not_found("order", "abc").category(),
            "not_found"
        );
    }

    #[test]
    fn test_only_execution_failures_retry() {
        assert!(OrderflowError::transient_execution("venue timeout").is_retryable());
        assert!(!OrderflowError::validation("bad token").is_retryable());
        assert!(!OrderflowError::infrastructure("op", "down").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = OrderflowError::infrastructure("enqueue", "connection refused");
        let display = format!("{err}");
        assert!(display.contains("Infrastructure error"));
        assert!(display.contains("enqueue"));
        assert!(display.contains("connection refused"));
    }
}
