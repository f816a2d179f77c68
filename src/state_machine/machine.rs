use super::errors::{StateMachineError, StateMachineResult};
use super::states::OrderStatus;
use crate::models::{Order, StatusUpdate};
use chrono::Utc;

/// Order state machine: the single authority on which lifecycle edges are
/// legal. Retry timing is deliberately kept out of here (see `retry`) so the
/// two concerns stay independently testable.
pub struct OrderStateMachine;

impl OrderStateMachine {
    /// Check whether `from -> to` is in the allowed transition set
    pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (from, to),
            (Pending, Routing)
                | (Routing, Building)
                | (Building, Submitted)
                | (Submitted, Confirmed)
                | (Pending, Failed)
                | (Routing, Failed)
                | (Building, Failed)
                | (Submitted, Failed)
        )
    }

    /// Apply a transition to the order, returning the status update record
    /// for the cache history and event fan-out.
    ///
    /// Terminal states accept no further transitions: a caller holding a job
    /// for a terminal order must treat it as already resolved.
    pub fn apply(
        order: &mut Order,
        to: OrderStatus,
        detail: Option<String>,
    ) -> StateMachineResult<StatusUpdate> {
        let from = order.status;

        if from.is_terminal() {
            return Err(StateMachineError::AlreadyTerminal {
                order_id: order.id.clone(),
                state: from,
            });
        }

        if !Self::can_transition(from, to) {
            return Err(StateMachineError::InvalidTransition {
                order_id: order.id.clone(),
                from,
                to,
            });
        }

        order.status = to;
        order.updated_at = Utc::now();

        Ok(StatusUpdate {
            status: to,
            timestamp: order.updated_at,
            detail,
        })
    }

    /// Internal retry path: revert a non-terminal order to `Pending` so the
    /// next attempt re-earns each stage. This is not a public transition
    /// (`can_transition` rejects backward edges) and is only exercised by the
    /// worker's retry branch.
    pub fn revert_for_retry(order: &mut Order, attempt: i32) -> StateMachineResult<StatusUpdate> {
        if order.status.is_terminal() {
            return Err(StateMachineError::AlreadyTerminal {
                order_id: order.id.clone(),
                state: order.status,
            });
        }

        order.status = OrderStatus::Pending;
        order.retry_count = attempt;
        order.updated_at = Utc::now();

        Ok(StatusUpdate {
            status: OrderStatus::Pending,
            timestamp: order.updated_at,
            detail: Some(format!("retry attempt {attempt} scheduled")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderKind, OrderParams};
    use rust_decimal_macros::dec;

    fn test_order() -> Order {
        let params = OrderParams {
            token_in: "SOL".to_string(),
            token_out: "USDC".to_string(),
            amount_in: dec!(10),
            slippage: dec!(0.01),
            kind: OrderKind::Market,
            priority: 1,
        };
        Order::new("order-1".to_string(), params)
    }

    #[test]
    fn test_success_path() {
        let mut order = test_order();

        for to in [
            OrderStatus::Routing,
            OrderStatus::Building,
            OrderStatus::Submitted,
            OrderStatus::Confirmed,
        ] {
            let update = OrderStateMachine::apply(&mut order, to, None).unwrap();
            assert_eq!(update.status, to);
            assert_eq!(order.status, to);
        }
    }

    #[test]
    fn test_failure_reachable_from_every_non_terminal_state() {
        for from in [
            OrderStatus::Pending,
            OrderStatus::Routing,
            OrderStatus::Building,
            OrderStatus::Submitted,
        ] {
            assert!(OrderStateMachine::can_transition(from, OrderStatus::Failed));
        }
    }

    #[test]
    fn test_skipping_stages_is_rejected() {
        let mut order = test_order();
        let err = OrderStateMachine::apply(&mut order, OrderStatus::Confirmed, None).unwrap_err();
        assert_eq!(
            err,
            StateMachineError::InvalidTransition {
                order_id: "order-1".to_string(),
                from: OrderStatus::Pending,
                to: OrderStatus::Confirmed,
            }
        );
        // The failed apply must not have mutated state
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        let mut order = test_order();
        order.status = OrderStatus::Confirmed;

        let err = OrderStateMachine::apply(&mut order, OrderStatus::Failed, None).unwrap_err();
        assert!(matches!(err, StateMachineError::AlreadyTerminal { .. }));

        order.status = OrderStatus::Failed;
        let err = OrderStateMachine::apply(&mut order, OrderStatus::Routing, None).unwrap_err();
        assert!(matches!(err, StateMachineError::AlreadyTerminal { .. }));
    }

    #[test]
    fn test_backward_edges_are_not_public_transitions() {
        assert!(!OrderStateMachine::can_transition(
            OrderStatus::Routing,
            OrderStatus::Pending
        ));
        assert!(!OrderStateMachine::can_transition(
            OrderStatus::Submitted,
            OrderStatus::Building
        ));
    }

    #[test]
    fn test_revert_for_retry() {
        let mut order = test_order();
        OrderStateMachine::apply(&mut order, OrderStatus::Routing, None).unwrap();

        let update = OrderStateMachine::revert_for_retry(&mut order, 2).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.retry_count, 2);
        assert_eq!(update.status, OrderStatus::Pending);

        order.status = OrderStatus::Failed;
        assert!(OrderStateMachine::revert_for_retry(&mut order, 3).is_err());
    }
}
