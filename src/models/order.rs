//! # Order Model
//!
//! Core data model for a single requested execution against an external
//! venue, tracked through the `PENDING -> ... -> CONFIRMED | FAILED`
//! lifecycle.
//!
//! ## Database Mapping
//!
//! The authoritative store maps this to an `orders` table:
//! ```sql
//! CREATE TABLE orders (
//!   id             TEXT PRIMARY KEY,
//!   token_in       TEXT NOT NULL,
//!   token_out      TEXT NOT NULL,
//!   amount_in      NUMERIC NOT NULL,
//!   slippage       NUMERIC NOT NULL,
//!   kind           TEXT NOT NULL,
//!   status         TEXT NOT NULL,
//!   amount_out     NUMERIC,
//!   executed_price NUMERIC,
//!   venue          TEXT,
//!   tx_ref         TEXT,
//!   error_message  TEXT,
//!   retry_count    INTEGER NOT NULL DEFAULT 0,
//!   created_at     TIMESTAMPTZ NOT NULL,
//!   updated_at     TIMESTAMPTZ NOT NULL
//! );
//! ```
//!
//! Invariant: `amount_out`, `executed_price`, `venue` and `tx_ref` are
//! populated iff `status = CONFIRMED`; `error_message` iff `status = FAILED`.

use crate::error::{OrderflowError, Result};
use crate::state_machine::OrderStatus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Market or limit execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    Market,
    Limit,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "MARKET"),
            Self::Limit => write!(f, "LIMIT"),
        }
    }
}

impl std::str::FromStr for OrderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "MARKET" => Ok(Self::Market),
            "LIMIT" => Ok(Self::Limit),
            _ => Err(format!("Invalid order kind: {s}")),
        }
    }
}

impl Default for OrderKind {
    fn default() -> Self {
        Self::Market
    }
}

/// Caller-supplied order parameters, validated before anything is enqueued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderParams {
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    #[serde(default = "default_slippage")]
    pub slippage: Decimal,
    #[serde(default)]
    pub kind: OrderKind,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_slippage() -> Decimal {
    // 1% tolerance when the caller does not specify one
    Decimal::new(1, 2)
}

fn default_priority() -> i32 {
    1
}

impl OrderParams {
    /// Reject malformed or out-of-range parameters. Validation failures are
    /// never enqueued and never retried.
    pub fn validate(&self) -> Result<()> {
        if self.token_in.trim().is_empty() {
            return Err(OrderflowError::validation("token_in must not be empty"));
        }
        if self.token_out.trim().is_empty() {
            return Err(OrderflowError::validation("token_out must not be empty"));
        }
        if self.token_in == self.token_out {
            return Err(OrderflowError::validation(
                "token_in and token_out must differ",
            ));
        }
        if self.amount_in <= Decimal::ZERO {
            return Err(OrderflowError::validation("amount_in must be positive"));
        }
        if self.slippage < Decimal::ZERO || self.slippage > Decimal::ONE {
            return Err(OrderflowError::validation(
                "slippage must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

/// A tracked order. The worker pool is the sole mutator of `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    pub slippage: Decimal,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub amount_out: Option<Decimal>,
    pub executed_price: Option<Decimal>,
    pub venue: Option<String>,
    pub tx_ref: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new pending order from validated parameters
    pub fn new(id: String, params: OrderParams) -> Self {
        let now = Utc::now();
        Self {
            id,
            token_in: params.token_in,
            token_out: params.token_out,
            amount_in: params.amount_in,
            slippage: params.slippage,
            kind: params.kind,
            status: OrderStatus::Pending,
            amount_out: None,
            executed_price: None,
            venue: None,
            tx_ref: None,
            error_message: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The parameters this order was submitted with
    pub fn params(&self) -> OrderParams {
        OrderParams {
            token_in: self.token_in.clone(),
            token_out: self.token_out.clone(),
            amount_in: self.amount_in,
            slippage: self.slippage,
            kind: self.kind,
            priority: 1,
        }
    }
}

/// Partial update applied to a stored order. `None` fields are left as-is.
#[derive(Debug, Clone, Default)]
pub struct OrderChangeset {
    pub status: Option<OrderStatus>,
    pub amount_out: Option<Decimal>,
    pub executed_price: Option<Decimal>,
    pub venue: Option<String>,
    pub tx_ref: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: Option<i32>,
}

impl OrderChangeset {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Filter for listing orders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
}

/// One entry of the append-only status-update history kept per order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn valid_params() -> OrderParams {
        OrderParams {
            token_in: "SOL".to_string(),
            token_out: "USDC".to_string(),
            amount_in: dec!(10),
            slippage: dec!(0.01),
            kind: OrderKind::Market,
            priority: 1,
        }
    }

    #[test]
    fn test_valid_params_pass() {
        assert!(valid_params().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_tokens() {
        let mut params = valid_params();
        params.token_in = "  ".to_string();
        assert!(matches!(
            params.validate(),
            Err(OrderflowError::Validation { .. })
        ));
    }

    #[test]
    fn test_rejects_identical_pair() {
        let mut params = valid_params();
        params.token_out = params.token_in.clone();
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let mut params = valid_params();
        params.amount_in = Decimal::ZERO;
        assert!(params.validate().is_err());

        params.amount_in = dec!(-1);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_slippage() {
        let mut params = valid_params();
        params.slippage = dec!(1.5);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_new_order_starts_pending() {
        let order = Order::new("o-1".to_string(), valid_params());
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.retry_count, 0);
        assert!(order.amount_out.is_none());
        assert!(order.error_message.is_none());
    }

    #[test]
    fn test_params_defaults_deserialize() {
        let params: OrderParams =
            serde_json::from_str(r#"{"token_in":"SOL","token_out":"USDC","amount_in":"10"}"#)
                .unwrap();
        assert_eq!(params.slippage, dec!(0.01));
        assert_eq!(params.kind, OrderKind::Market);
        assert_eq!(params.priority, 1);
    }
}
