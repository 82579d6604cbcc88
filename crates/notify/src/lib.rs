//! Notification hub
//!
//! Maps an order id to the single live subscriber channel for that order.
//! Publishing never blocks the caller and never fails: a full or closed
//! channel drops the event.

use order_engine_metrics::MetricsCollector;
use order_engine_types::OrderEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Identifies one registration so a superseded subscriber cannot remove its
/// replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// What happened to a published event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    NoSubscriber,
    /// Subscriber channel full; event dropped
    Dropped,
    /// Subscriber went away; registration removed
    Closed,
}

impl Delivery {
    pub fn as_str(&self) -> &'static str {
        match self {
            Delivery::Delivered => "delivered",
            Delivery::NoSubscriber => "no_subscriber",
            Delivery::Dropped => "dropped",
            Delivery::Closed => "closed",
        }
    }
}

struct Registration {
    id: SubscriptionId,
    sender: mpsc::Sender<OrderEvent>,
}

#[derive(Default)]
pub struct NotificationHub {
    subscribers: RwLock<HashMap<String, Registration>>,
    next_id: AtomicU64,
    metrics: MetricsCollector,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sender` for `order_id`, replacing any previous registration
    pub async fn subscribe(&self, order_id: &str, sender: mpsc::Sender<OrderEvent>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let previous = self
            .subscribers
            .write()
            .await
            .insert(order_id.to_string(), Registration { id, sender });

        if previous.is_some() {
            debug!(order_id = %order_id, "Replaced existing subscriber");
        } else {
            debug!(order_id = %order_id, "Subscriber registered");
        }
        id
    }

    /// Deliver `event` to the subscriber of `order_id`, if any
    pub async fn publish(&self, order_id: &str, event: OrderEvent) -> Delivery {
        let delivery = self.try_publish(order_id, event).await;
        self.metrics.record_notification(delivery.as_str());
        delivery
    }

    async fn try_publish(&self, order_id: &str, event: OrderEvent) -> Delivery {
        let result = {
            let subscribers = self.subscribers.read().await;
            match subscribers.get(order_id) {
                Some(registration) => (registration.id, registration.sender.try_send(event)),
                None => return Delivery::NoSubscriber,
            }
        };

        match result {
            (_, Ok(())) => Delivery::Delivered,
            (_, Err(TrySendError::Full(_))) => {
                warn!(order_id = %order_id, "Subscriber channel full, dropping event");
                Delivery::Dropped
            }
            (id, Err(TrySendError::Closed(_))) => {
                debug!(order_id = %order_id, "Subscriber closed, removing registration");
                self.release(order_id, id).await;
                Delivery::Closed
            }
        }
    }

    /// Remove whatever is registered for `order_id`; no-op if nothing is
    pub async fn unsubscribe(&self, order_id: &str) {
        if self.subscribers.write().await.remove(order_id).is_some() {
            debug!(order_id = %order_id, "Subscriber removed");
        }
    }

    /// Remove the registration only if `subscription` is still the current one
    pub async fn release(&self, order_id: &str, subscription: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write().await;
        match subscribers.get(order_id) {
            Some(registration) if registration.id == subscription => {
                subscribers.remove(order_id);
                true
            }
            _ => false,
        }
    }

    /// Send `event` to every subscriber; returns the number delivered
    pub async fn broadcast(&self, event: &OrderEvent) -> usize {
        let subscribers = self.subscribers.read().await;
        subscribers
            .values()
            .filter(|registration| registration.sender.try_send(event.clone()).is_ok())
            .count()
    }

    pub async fn has_subscriber(&self, order_id: &str) -> bool {
        self.subscribers.read().await.contains_key(order_id)
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}
