//! Data layer: the order model and its companions.

pub mod order;

pub use order::{Order, OrderChangeset, OrderFilter, OrderKind, OrderParams, StatusUpdate};
