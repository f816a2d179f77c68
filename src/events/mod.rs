//! # Notification Fan-out
//!
//! Per-order subscriber registry that pushes status events to connected
//! observers as they occur. Delivery is best-effort: a closed observer is
//! pruned and logged, never an error for the publisher, and there is no
//! replay: an observer that connects after an event fired recovers the
//! latest snapshot and retained history from the cache instead.

use crate::models::StatusUpdate;
use crate::state_machine::OrderStatus;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// One status event pushed to subscribers of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: String,
    pub status: OrderStatus,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl OrderEvent {
    pub fn from_update(order_id: impl Into<String>, update: &StatusUpdate) -> Self {
        Self {
            order_id: order_id.into(),
            status: update.status,
            detail: update.detail.clone(),
            timestamp: update.timestamp,
        }
    }

    /// Whether this event closes the order's lifecycle
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A live subscription to one order's events. Dropping the subscription (or
/// just its receiver) disconnects the observer; the hub prunes it on the next
/// publish.
pub struct Subscription {
    pub id: Uuid,
    pub order_id: String,
    pub receiver: mpsc::UnboundedReceiver<OrderEvent>,
}

struct SubscriberEntry {
    id: Uuid,
    sender: mpsc::UnboundedSender<OrderEvent>,
}

/// Aggregate fan-out counts for observability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutStats {
    /// Total live subscriptions across all orders
    pub subscribers: usize,
    /// Distinct orders currently being watched
    pub orders: usize,
}

/// Mapping from order id to the set of currently-subscribed observers
#[derive(Clone, Default)]
pub struct NotificationHub {
    subscribers: Arc<DashMap<String, Vec<SubscriberEntry>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer for an order's events
    pub fn subscribe(&self, order_id: impl Into<String>) -> Subscription {
        let order_id = order_id.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        self.subscribers
            .entry(order_id.clone())
            .or_default()
            .push(SubscriberEntry { id, sender });

        debug!(order_id = %order_id, subscriber_id = %id, "Subscriber registered");
        Subscription {
            id,
            order_id,
            receiver,
        }
    }

    /// Remove one observer; a no-op when it is already gone
    pub fn unsubscribe(&self, order_id: &str, subscriber_id: Uuid) {
        if let Some(mut entry) = self.subscribers.get_mut(order_id) {
            entry.retain(|s| s.id != subscriber_id);
            let empty = entry.is_empty();
            drop(entry);
            if empty {
                self.subscribers.remove_if(order_id, |_, v| v.is_empty());
            }
        }
        debug!(order_id, subscriber_id = %subscriber_id, "Subscriber removed");
    }

    /// Deliver the event to every currently-registered observer of the
    /// order. Closed observers are pruned. Returns how many received it.
    pub fn publish(&self, event: OrderEvent) -> usize {
        let order_id = event.order_id.clone();

        let delivered = match self.subscribers.get_mut(&order_id) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|s| s.sender.send(event.clone()).is_ok());
                let pruned = before - entry.len();
                if pruned > 0 {
                    debug!(order_id = %order_id, pruned, "Pruned disconnected subscribers");
                }
                let delivered = entry.len();
                let empty = entry.is_empty();
                drop(entry);
                if empty {
                    self.subscribers.remove_if(&order_id, |_, v| v.is_empty());
                }
                delivered
            }
            None => 0,
        };

        debug!(order_id = %order_id, status = %event.status, delivered, "Event published");
        delivered
    }

    /// Aggregate counts for observability
    pub fn stats(&self) -> FanoutStats {
        let mut subscribers = 0;
        let mut orders = 0;
        for entry in self.subscribers.iter() {
            if !entry.value().is_empty() {
                orders += 1;
                subscribers += entry.value().len();
            }
        }
        FanoutStats {
            subscribers,
            orders,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(order_id: &str, status: OrderStatus) -> OrderEvent {
        OrderEvent {
            order_id: order_id.to_string(),
            status,
            detail: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_events() {
        let hub = NotificationHub::new();
        let mut sub = hub.subscribe("o-1");

        assert_eq!(hub.publish(event("o-1", OrderStatus::Routing)), 1);

        let received = sub.receiver.recv().await.unwrap();
        assert_eq!(received.order_id, "o-1");
        assert_eq!(received.status, OrderStatus::Routing);
    }

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers_of_the_order() {
        let hub = NotificationHub::new();
        let mut a = hub.subscribe("o-1");
        let mut b = hub.subscribe("o-1");
        let mut other = hub.subscribe("o-2");

        assert_eq!(hub.publish(event("o-1", OrderStatus::Confirmed)), 2);

        assert!(a.receiver.recv().await.is_some());
        assert!(b.receiver.recv().await.is_some());
        assert!(other.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let hub = NotificationHub::new();
        assert_eq!(hub.publish(event("ghost", OrderStatus::Routing)), 0);
    }

    #[tokio::test]
    async fn test_disconnected_subscribers_are_pruned() {
        let hub = NotificationHub::new();
        let sub = hub.subscribe("o-1");
        drop(sub);

        assert_eq!(hub.publish(event("o-1", OrderStatus::Routing)), 0);
        assert_eq!(hub.stats().subscribers, 0);
        assert_eq!(hub.stats().orders, 0);
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscribers() {
        let hub = NotificationHub::new();
        hub.publish(event("o-1", OrderStatus::Routing));

        let mut late = hub.subscribe("o-1");
        assert!(late.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_and_stats() {
        let hub = NotificationHub::new();
        let a = hub.subscribe("o-1");
        let _b = hub.subscribe("o-1");
        let _c = hub.subscribe("o-2");

        assert_eq!(
            hub.stats(),
            FanoutStats {
                subscribers: 3,
                orders: 2
            }
        );

        hub.unsubscribe("o-1", a.id);
        assert_eq!(
            hub.stats(),
            FanoutStats {
                subscribers: 2,
                orders: 2
            }
        );
    }
}
