//! Bounded FIFO queue.
//!
//! [`BoundedQueue`] is a thread-safe, generic FIFO with a fixed capacity.
//! It backs the per-worker message queues in `swarmctl-core`, but knows
//! nothing about workers or tasks -- it only moves clones of `T` around in
//! order.

use std::collections::VecDeque;

use tokio::sync::Mutex;

use crate::error::{KernelError, Result};

/// Default capacity used when a queue is constructed with `max_size <= 0`.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100;

/// A bounded, thread-safe FIFO queue.
///
/// Cloning `BoundedQueue` is not supported directly; wrap it in `Arc` to
/// share it across tasks.
pub struct BoundedQueue<T> {
    max_size: usize,
    items: Mutex<VecDeque<T>>,
}

impl<T> BoundedQueue<T> {
    /// Create a new queue with the given capacity. A `max_size` of `0`
    /// falls back to [`DEFAULT_MAX_QUEUE_SIZE`].
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size: if max_size == 0 {
                DEFAULT_MAX_QUEUE_SIZE
            } else {
                max_size
            },
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// The configured capacity.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Append an item to the tail. Fails with [`KernelError::QueueFull`]
    /// once `len() == max_size`.
    pub async fn enqueue(&self, item: T) -> Result<()> {
        let mut items = self.items.lock().await;
        if items.len() >= self.max_size {
            return Err(KernelError::QueueFull {
                max_size: self.max_size,
            });
        }
        items.push_back(item);
        Ok(())
    }

    /// Remove and return the head of the queue, if any.
    pub async fn dequeue(&self) -> Option<T> {
        self.items.lock().await.pop_front()
    }

    /// The current number of queued items.
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Whether the queue currently holds no items.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove and return every queued item, preserving FIFO order. The
    /// returned `Vec` is a snapshot decoupled from the queue's internal
    /// storage: later enqueues cannot affect it.
    pub async fn drain(&self) -> Vec<T> {
        let mut items = self.items.lock().await;
        items.drain(..).collect()
    }
}

impl<T: Clone> BoundedQueue<T> {
    /// Clone the head of the queue without removing it.
    pub async fn peek(&self) -> Option<T> {
        self.items.lock().await.front().cloned()
    }
}

impl<T> Default for BoundedQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUEUE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_dequeue_preserves_fifo_order() {
        let q: BoundedQueue<i32> = BoundedQueue::new(10);
        q.enqueue(1).await.unwrap();
        q.enqueue(2).await.unwrap();
        q.enqueue(3).await.unwrap();
        assert_eq!(q.dequeue().await, Some(1));
        assert_eq!(q.dequeue().await, Some(2));
        assert_eq!(q.dequeue().await, Some(3));
        assert_eq!(q.dequeue().await, None);
    }

    #[tokio::test]
    async fn enqueue_beyond_capacity_errors() {
        let q: BoundedQueue<i32> = BoundedQueue::new(2);
        q.enqueue(1).await.unwrap();
        q.enqueue(2).await.unwrap();
        let err = q.enqueue(3).await.unwrap_err();
        assert!(matches!(err, KernelError::QueueFull { max_size: 2 }));
    }

    #[tokio::test]
    async fn zero_capacity_falls_back_to_default() {
        let q: BoundedQueue<i32> = BoundedQueue::new(0);
        assert_eq!(q.max_size(), DEFAULT_MAX_QUEUE_SIZE);
    }

    #[tokio::test]
    async fn peek_does_not_remove() {
        let q: BoundedQueue<i32> = BoundedQueue::new(5);
        q.enqueue(42).await.unwrap();
        assert_eq!(q.peek().await, Some(42));
        assert_eq!(q.len().await, 1);
    }

    #[tokio::test]
    async fn drain_empties_queue_and_returns_all_in_order() {
        let q: BoundedQueue<i32> = BoundedQueue::new(5);
        for i in 0..5 {
            q.enqueue(i).await.unwrap();
        }
        let drained = q.drain().await;
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        assert_eq!(q.len().await, 0);
    }

    #[tokio::test]
    async fn drained_snapshot_is_independent_of_later_enqueues() {
        let q: BoundedQueue<i32> = BoundedQueue::new(5);
        q.enqueue(1).await.unwrap();
        let drained = q.drain().await;
        q.enqueue(2).await.unwrap();
        assert_eq!(drained, vec![1]);
        assert_eq!(q.len().await, 1);
    }
}
