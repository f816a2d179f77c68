//! # Order Cache
//!
//! Fast in-process key-value store of the current order snapshot plus an
//! append-only status-update history, with bounded retention. The cache is a
//! derived, best-effort mirror of persistent state and never authoritative:
//! readers fall back to the store on a miss, and entries expire on a TTL
//! independent of order completion.

use crate::models::{Order, StatusUpdate};
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// One cached order: snapshot + ordered update history
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub order: Order,
    pub updates: Vec<StatusUpdate>,
    cached_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// Shared order cache, cheap to clone across workers and services
#[derive(Debug, Clone)]
pub struct OrderCache {
    entries: std::sync::Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
    history_limit: usize,
}

impl OrderCache {
    pub fn new(ttl: Duration, history_limit: usize) -> Self {
        Self {
            entries: std::sync::Arc::new(DashMap::new()),
            ttl,
            history_limit,
        }
    }

    /// Write or overwrite the snapshot for an order. The update history is
    /// preserved across snapshot writes; the entry's TTL clock restarts.
    pub fn put(&self, order: Order) {
        let id = order.id.clone();
        match self.entries.get_mut(&id) {
            Some(mut entry) => {
                entry.order = order;
                entry.cached_at = Instant::now();
            }
            None => {
                self.entries.insert(
                    id,
                    CacheEntry {
                        order,
                        updates: Vec::new(),
                        cached_at: Instant::now(),
                    },
                );
            }
        }
    }

    /// Read the cached snapshot, expiring the entry lazily
    pub fn get(&self, order_id: &str) -> Option<Order> {
        let expired = match self.entries.get(order_id) {
            Some(entry) if entry.is_expired(self.ttl) => true,
            Some(entry) => return Some(entry.order.clone()),
            None => return None,
        };
        if expired {
            debug!(order_id, "Evicting expired cache entry");
            self.entries.remove(order_id);
        }
        None
    }

    /// Append one status-update event to the order's history list. The list
    /// is bounded: once the limit is reached the oldest entries are dropped.
    pub fn append_update(&self, order_id: &str, update: StatusUpdate) {
        if let Some(mut entry) = self.entries.get_mut(order_id) {
            entry.updates.push(update);
            if entry.updates.len() > self.history_limit {
                let excess = entry.updates.len() - self.history_limit;
                entry.updates.drain(..excess);
            }
            entry.cached_at = Instant::now();
        }
    }

    /// Ordered status-update history for an order (empty when not cached)
    pub fn get_updates(&self, order_id: &str) -> Vec<StatusUpdate> {
        match self.entries.get(order_id) {
            Some(entry) if !entry.is_expired(self.ttl) => entry.updates.clone(),
            _ => Vec::new(),
        }
    }

    /// Drop an entry outright
    pub fn remove(&self, order_id: &str) {
        self.entries.remove(order_id);
    }

    /// Sweep every expired entry; returns how many were evicted
    pub fn evict_expired(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| !entry.is_expired(ttl));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
