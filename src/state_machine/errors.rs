//! Structured error types for order state transitions.

use super::states::OrderStatus;
use thiserror::Error;

/// Errors raised while driving the order state machine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    /// The requested edge is not in the allowed transition set. This is a
    /// programming-error class: the in-flight attempt aborts rather than
    /// coercing state.
    #[error("Invalid transition from {from} to {to} for order {order_id}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// The order already reached a terminal state; the caller must treat the
    /// job as resolved instead of transitioning further.
    #[error("Order {order_id} is already terminal in state {state}")]
    AlreadyTerminal {
        order_id: String,
        state: OrderStatus,
    },
}

/// Result type alias for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;
