// State machine module for the order lifecycle
//
// Defines the legal status edges and the apply/revert operations the worker
// pool drives. Retry timing lives in `crate::retry`.

pub mod errors;
pub mod machine;
pub mod states;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use machine::OrderStateMachine;
pub use states::OrderStatus;
