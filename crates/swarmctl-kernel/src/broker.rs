//! Generic publish/subscribe event broker.
//!
//! Unlike [`tokio::sync::broadcast`] (used by the wider workspace's IPC
//! bus), [`Broker`] gives every subscriber its own bounded channel and never
//! blocks a publisher on a slow subscriber: when a subscriber's buffer is
//! full, the event is dropped for *that subscriber only* and publishing
//! continues for the rest. FIFO order is preserved per subscriber.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tracing::trace;

/// Default bounded capacity for a single subscriber's channel.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 128;

struct Inner<T> {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, mpsc::Sender<T>>>,
    capacity: usize,
}

/// A clonable handle to a publish/subscribe event broker for payload `T`.
pub struct Broker<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Broker<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Broker<T> {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl<T> Broker<T> {
    /// Create a broker whose subscriber channels hold at most `capacity`
    /// buffered events each.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(0),
                subscribers: Mutex::new(HashMap::new()),
                capacity: capacity.max(1),
            }),
        }
    }

    /// The number of currently live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().unwrap().len()
    }
}

impl<T: Clone> Broker<T> {
    /// Register a new subscriber. Dropping the returned [`Subscription`]
    /// deregisters it.
    pub fn subscribe(&self) -> Subscription<T> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        self.inner.subscribers.lock().unwrap().insert(id, tx);
        Subscription {
            id,
            rx,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Publish an event to every live subscriber. Delivery to each
    /// subscriber is non-blocking: a subscriber whose buffer is currently
    /// full simply does not receive this event.
    pub fn publish(&self, event: T) {
        let subscribers = self.inner.subscribers.lock().unwrap();
        for (id, tx) in subscribers.iter() {
            if tx.try_send(event.clone()).is_err() {
                trace!(subscriber = id, "broker dropped event for full subscriber");
            }
        }
    }
}

/// A live subscription to a [`Broker`]. Receive events with [`recv`].
///
/// Holds only a [`Weak`] reference back to the broker's shared state, not a
/// full [`Broker`] clone -- a subscription keeping its own sender alive via a
/// strong reference would mean the broker's last real handle being dropped
/// could never close the channel, and [`recv`] could never observe it.
///
/// [`recv`]: Subscription::recv
pub struct Subscription<T> {
    id: u64,
    rx: mpsc::Receiver<T>,
    inner: Weak<Inner<T>>,
}

impl<T: Clone> Subscription<T> {
    /// Await the next published event, or `None` once every live [`Broker`]
    /// handle (and thus every sender) has been dropped.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.subscribers.lock().unwrap().remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_in_order_to_each_subscriber() {
        let broker: Broker<i32> = Broker::new(8);
        let mut sub_a = broker.subscribe();
        let mut sub_b = broker.subscribe();

        broker.publish(1);
        broker.publish(2);
        broker.publish(3);

        assert_eq!(sub_a.recv().await, Some(1));
        assert_eq!(sub_a.recv().await, Some(2));
        assert_eq!(sub_a.recv().await, Some(3));

        assert_eq!(sub_b.recv().await, Some(1));
        assert_eq!(sub_b.recv().await, Some(2));
        assert_eq!(sub_b.recv().await, Some(3));
    }

    #[tokio::test]
    async fn full_subscriber_buffer_drops_event_without_blocking() {
        let broker: Broker<i32> = Broker::new(1);
        let mut sub = broker.subscribe();

        broker.publish(1);
        broker.publish(2); // dropped: sub's buffer (capacity 1) is full

        assert_eq!(sub.recv().await, Some(1));
        // The second event was lost, not delivered late.
        assert_eq!(broker.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn dropping_subscription_deregisters_it() {
        let broker: Broker<i32> = Broker::new(8);
        let sub = broker.subscribe();
        assert_eq!(broker.subscriber_count(), 1);
        drop(sub);
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn recv_returns_none_after_broker_dropped() {
        let broker: Broker<i32> = Broker::new(8);
        let mut sub = broker.subscribe();
        drop(broker);
        assert_eq!(sub.recv().await, None);
    }
}
