//! Per-worker message queues, dispatch decisions, and debounced queue-change
//! events (C8).
//!
//! One [`QueueManager`] owns every worker's [`BoundedQueue`]. Queues are
//! created lazily on first use and deleted when a worker retires.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use swarmctl_kernel::{BoundedQueue, Broker};
use swarmctl_pool::{WorkerPool, WorkerStatus};

use crate::collaborators::LlmDriver;
use crate::constants::{DEFAULT_MAX_QUEUE_SIZE, QUEUE_EVENT_DEBOUNCE_INTERVAL};
use crate::error::{CoordinatorError, Result};

/// A single pending message bound for a worker's inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: Uuid,
    pub content: String,
    pub from: String,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedMessage {
    fn new(from: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            content: content.into(),
            from: from.into(),
            enqueued_at: Utc::now(),
        }
    }
}

/// The outcome of [`QueueManager::send_to_worker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Delivered immediately; the worker was `Ready`.
    Sent,
    /// The worker was not `Ready`; the message was enqueued at this
    /// position (1-based).
    Queued { queue_position: usize },
}

/// An event published whenever a worker's queue length changes, after
/// debounce coalescing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerQueueChanged {
    pub worker_id: String,
    pub queue_count: usize,
}

struct DebounceState {
    pending: StdMutex<HashMap<String, usize>>,
    flush_scheduled: AtomicBool,
}

/// Owns every worker's bounded FIFO queue and the turn-complete / retire
/// dispatch logic built on top of it.
pub struct QueueManager {
    pool: WorkerPool,
    llm: Arc<dyn LlmDriver>,
    max_size: usize,
    queues: Mutex<HashMap<String, Arc<BoundedQueue<QueuedMessage>>>>,
    events: Broker<WorkerQueueChanged>,
    debounce: Arc<DebounceState>,
}

impl QueueManager {
    pub fn new(pool: WorkerPool, llm: Arc<dyn LlmDriver>) -> Arc<Self> {
        Self::with_max_size(pool, llm, DEFAULT_MAX_QUEUE_SIZE)
    }

    pub fn with_max_size(pool: WorkerPool, llm: Arc<dyn LlmDriver>, max_size: usize) -> Arc<Self> {
        Arc::new(Self {
            pool,
            llm,
            max_size,
            queues: Mutex::new(HashMap::new()),
            events: Broker::new(128),
            debounce: Arc::new(DebounceState {
                pending: StdMutex::new(HashMap::new()),
                flush_scheduled: AtomicBool::new(false),
            }),
        })
    }

    /// Subscribe to debounced `WorkerQueueChanged` events.
    pub fn subscribe_events(&self) -> swarmctl_kernel::Subscription<WorkerQueueChanged> {
        self.events.subscribe()
    }

    /// Wire this manager's dequeue-on-ready and drain-on-retire behavior
    /// into the pool's lifecycle callbacks. Call once after construction.
    pub async fn attach_to_pool(self: &Arc<Self>) {
        let turn_complete_self = Arc::clone(self);
        self.pool
            .set_turn_complete_callback(Arc::new(move |worker_id| {
                let manager = Arc::clone(&turn_complete_self);
                tokio::spawn(async move {
                    manager.handle_turn_complete(&worker_id).await;
                });
            }))
            .await;

        let retire_self = Arc::clone(self);
        self.pool
            .set_retire_callback(Arc::new(move |worker_id| {
                let manager = Arc::clone(&retire_self);
                Box::pin(async move {
                    manager.drain_queue_for_retired_worker(&worker_id).await;
                }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
            }))
            .await;
    }

    async fn queue_for(&self, worker_id: &str) -> Arc<BoundedQueue<QueuedMessage>> {
        let mut queues = self.queues.lock().await;
        queues
            .entry(worker_id.to_string())
            .or_insert_with(|| Arc::new(BoundedQueue::new(self.max_size)))
            .clone()
    }

    /// Send a coordinator-authored message to a worker: delivered
    /// immediately if the worker is `Ready`, queued otherwise. The
    /// ready-status check and the resulting decision happen while holding
    /// the worker's queue slot, so a concurrent status change cannot cause
    /// both an immediate delivery and an enqueue for the same message.
    pub async fn send_to_worker(&self, worker_id: &str, message: &str) -> Result<SendOutcome> {
        if message.is_empty() {
            return Err(CoordinatorError::MissingMessage);
        }
        let worker = self
            .pool
            .get_worker(worker_id)
            .await
            .ok_or_else(|| CoordinatorError::WorkerNotFound {
                worker_id: worker_id.to_string(),
            })?;

        if worker.status == WorkerStatus::Ready {
            self.llm
                .spawn(
                    worker_id,
                    worker.session_id.as_deref().unwrap_or_default(),
                    message,
                )
                .await
                .map_err(|reason| CoordinatorError::SessionResumeFailed {
                    worker_id: worker_id.to_string(),
                    reason,
                })?;
            return Ok(SendOutcome::Sent);
        }

        let position = self
            .enqueue(worker_id, QueuedMessage::new("COORDINATOR", message))
            .await?;
        Ok(SendOutcome::Queued {
            queue_position: position,
        })
    }

    /// Always queues, regardless of worker status, tagged `from = "USER"`.
    pub async fn send_user_message_to_worker(
        &self,
        worker_id: &str,
        message: &str,
    ) -> Result<SendOutcome> {
        if message.is_empty() {
            return Err(CoordinatorError::MissingMessage);
        }
        if self.pool.get_worker(worker_id).await.is_none() {
            return Err(CoordinatorError::WorkerNotFound {
                worker_id: worker_id.to_string(),
            });
        }
        let position = self
            .enqueue(worker_id, QueuedMessage::new("USER", message))
            .await?;
        Ok(SendOutcome::Queued {
            queue_position: position,
        })
    }

    async fn enqueue(&self, worker_id: &str, message: QueuedMessage) -> Result<usize> {
        let queue = self.queue_for(worker_id).await;
        queue
            .enqueue(message)
            .await
            .map_err(|_| CoordinatorError::QueueFull {
                worker_id: worker_id.to_string(),
            })?;
        let len = queue.len().await;
        self.emit_queue_changed(worker_id, len);
        Ok(len)
    }

    /// Invoked once per `Working -> Ready` transition. Dequeues exactly one
    /// message (if any) and attempts fire-and-forget delivery; a delivery
    /// failure discards the message rather than re-queueing it.
    pub async fn handle_turn_complete(&self, worker_id: &str) {
        let queue = self.queue_for(worker_id).await;
        let Some(message) = queue.dequeue().await else {
            return;
        };
        let len = queue.len().await;
        self.emit_queue_changed(worker_id, len);

        let Some(worker) = self.pool.get_worker(worker_id).await else {
            warn!(worker_id, "turn complete for unknown worker, dropping dequeued message");
            return;
        };
        if let Err(reason) = self
            .llm
            .spawn(
                worker_id,
                worker.session_id.as_deref().unwrap_or_default(),
                &message.content,
            )
            .await
        {
            warn!(
                worker_id,
                message_id = %message.id,
                reason,
                "delivery of dequeued message failed, discarding"
            );
        } else {
            debug!(worker_id, message_id = %message.id, "delivered dequeued message");
        }
    }

    /// Invoked on retire/cancel: drains and deletes the worker's queue.
    pub async fn drain_queue_for_retired_worker(&self, worker_id: &str) -> Vec<QueuedMessage> {
        let mut queues = self.queues.lock().await;
        let Some(queue) = queues.remove(worker_id) else {
            return Vec::new();
        };
        drop(queues);
        let drained = queue.drain().await;
        if !drained.is_empty() {
            debug!(worker_id, count = drained.len(), "drained queue for retired worker");
        }
        self.emit_queue_changed(worker_id, 0);
        drained
    }

    /// Current queue length for a worker, or 0 if no queue exists yet.
    pub async fn queue_len(&self, worker_id: &str) -> usize {
        let queues = self.queues.lock().await;
        match queues.get(worker_id) {
            Some(q) => q.len().await,
            None => 0,
        }
    }

    fn emit_queue_changed(&self, worker_id: &str, count: usize) {
        self.debounce
            .pending
            .lock()
            .unwrap()
            .insert(worker_id.to_string(), count);

        if self
            .debounce
            .flush_scheduled
            .swap(true, Ordering::SeqCst)
        {
            return; // a flush is already armed; it will pick up this update too
        }

        let debounce = Arc::clone(&self.debounce);
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(QUEUE_EVENT_DEBOUNCE_INTERVAL).await;
            debounce.flush_scheduled.store(false, Ordering::SeqCst);
            let pending: HashMap<String, usize> = {
                let mut guard = debounce.pending.lock().unwrap();
                std::mem::take(&mut *guard)
            };
            for (worker_id, queue_count) in pending {
                events.publish(WorkerQueueChanged {
                    worker_id,
                    queue_count,
                });
            }
        });
    }
}
