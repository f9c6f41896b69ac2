//! Worker lifecycle pool.
//!
//! Tracks each worker's `Ready | Working | Retired` status and fires
//! registered callbacks on turn completion and retirement. The pool knows
//! nothing about tasks or assignments -- that is `swarmctl-core`'s job; it
//! only owns the worker records and their lifecycle transitions.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::error::{PoolError, Result};

/// A worker's position in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Ready,
    Working,
    Retired,
}

/// A snapshot of one worker's pool-tracked state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub id: String,
    pub session_id: Option<String>,
    pub status: WorkerStatus,
}

/// Invoked by the pool exactly once per `Working -> Ready` transition.
/// Fire-and-forget: the pool does not wait for this to finish.
pub type TurnCompleteSink = Arc<dyn Fn(String) + Send + Sync>;
/// Invoked by the pool exactly once per retire/cancel. The pool awaits the
/// returned future before `retire`/`cancel` returns, so whatever the sink
/// does (draining a queue, say) is guaranteed complete by the time the
/// caller observes the worker as retired.
pub type RetireSink =
    Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct Entry {
    record: WorkerRecord,
}

/// The worker pool. Clone to share; internally `Arc`-backed.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<Inner>,
}

struct Inner {
    workers: DashMap<String, AsyncMutex<Entry>>,
    turn_complete: AsyncMutex<Option<TurnCompleteSink>>,
    retire: AsyncMutex<Option<RetireSink>>,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPool {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                workers: DashMap::new(),
                turn_complete: AsyncMutex::new(None),
                retire: AsyncMutex::new(None),
            }),
        }
    }

    /// Register the callback fired whenever a worker transitions
    /// `Working -> Ready`.
    pub async fn set_turn_complete_callback(&self, sink: TurnCompleteSink) {
        *self.inner.turn_complete.lock().await = Some(sink);
    }

    /// Register the callback fired whenever a worker retires or is
    /// cancelled.
    pub async fn set_retire_callback(&self, sink: RetireSink) {
        *self.inner.retire.lock().await = Some(sink);
    }

    /// Add a new `Ready` worker to the pool.
    pub fn register(&self, worker_id: impl Into<String>, session_id: Option<String>) -> Result<()> {
        let worker_id = worker_id.into();
        if self.inner.workers.contains_key(&worker_id) {
            return Err(PoolError::AlreadyRegistered { worker_id });
        }
        info!(worker_id = %worker_id, "registering worker");
        self.inner.workers.insert(
            worker_id.clone(),
            AsyncMutex::new(Entry {
                record: WorkerRecord {
                    id: worker_id,
                    session_id,
                    status: WorkerStatus::Ready,
                },
            }),
        );
        Ok(())
    }

    /// Snapshot of a single worker's record.
    pub async fn get_worker(&self, worker_id: &str) -> Option<WorkerRecord> {
        let entry = self.inner.workers.get(worker_id)?;
        Some(entry.lock().await.record.clone())
    }

    /// Snapshot of every non-retired worker.
    pub async fn active_workers(&self) -> Vec<WorkerRecord> {
        let mut out = Vec::new();
        for entry in self.inner.workers.iter() {
            let record = entry.value().lock().await.record.clone();
            if record.status != WorkerStatus::Retired {
                out.push(record);
            }
        }
        out
    }

    /// Snapshot of every worker regardless of status.
    pub async fn all_workers(&self) -> Vec<WorkerRecord> {
        let mut out = Vec::new();
        for entry in self.inner.workers.iter() {
            out.push(entry.value().lock().await.record.clone());
        }
        out
    }

    /// Mark a worker `Working`.
    pub async fn assign_task(&self, worker_id: &str) -> Result<()> {
        let entry = self
            .inner
            .workers
            .get(worker_id)
            .ok_or_else(|| PoolError::WorkerNotFound {
                worker_id: worker_id.to_string(),
            })?;
        let mut guard = entry.lock().await;
        if guard.record.status == WorkerStatus::Retired {
            return Err(PoolError::AlreadyRetired {
                worker_id: worker_id.to_string(),
            });
        }
        guard.record.status = WorkerStatus::Working;
        debug!(worker_id, "worker marked working");
        Ok(())
    }

    /// Mark a worker `Ready` after finishing a turn, and fire the
    /// turn-complete callback exactly once.
    pub async fn complete_task(&self, worker_id: &str) -> Result<()> {
        {
            let entry = self
                .inner
                .workers
                .get(worker_id)
                .ok_or_else(|| PoolError::WorkerNotFound {
                    worker_id: worker_id.to_string(),
                })?;
            let mut guard = entry.lock().await;
            if guard.record.status == WorkerStatus::Retired {
                return Err(PoolError::AlreadyRetired {
                    worker_id: worker_id.to_string(),
                });
            }
            guard.record.status = WorkerStatus::Ready;
        }
        debug!(worker_id, "worker turn complete, now ready");
        if let Some(sink) = self.inner.turn_complete.lock().await.clone() {
            sink(worker_id.to_string());
        }
        Ok(())
    }

    /// Retire a worker: status becomes `Retired` and the retire callback
    /// fires exactly once. Idempotent no-op if already retired.
    pub async fn retire(&self, worker_id: &str) -> Result<()> {
        self.retire_inner(worker_id).await
    }

    /// Cancel a worker. Semantically identical to [`retire`] from the
    /// pool's perspective -- both end the worker's lifecycle and fire the
    /// retire callback once.
    ///
    /// [`retire`]: WorkerPool::retire
    pub async fn cancel(&self, worker_id: &str) -> Result<()> {
        self.retire_inner(worker_id).await
    }

    async fn retire_inner(&self, worker_id: &str) -> Result<()> {
        let already_retired = {
            let entry = self
                .inner
                .workers
                .get(worker_id)
                .ok_or_else(|| PoolError::WorkerNotFound {
                    worker_id: worker_id.to_string(),
                })?;
            let mut guard = entry.lock().await;
            let was_retired = guard.record.status == WorkerStatus::Retired;
            guard.record.status = WorkerStatus::Retired;
            was_retired
        };
        if already_retired {
            return Ok(());
        }
        info!(worker_id, "worker retired");
        let sink = self.inner.retire.lock().await.clone();
        if let Some(sink) = sink {
            sink(worker_id.to_string()).await;
        }
        Ok(())
    }

    /// Retire every currently-known worker.
    pub async fn close(&self) {
        let ids: Vec<String> = self.inner.workers.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            let _ = self.retire(&id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn register_creates_ready_worker() {
        let pool = WorkerPool::new();
        pool.register("worker-1", Some("sess-1".into())).unwrap();
        let record = pool.get_worker("worker-1").await.unwrap();
        assert_eq!(record.status, WorkerStatus::Ready);
    }

    #[tokio::test]
    async fn assign_then_complete_fires_turn_complete_once() {
        let pool = WorkerPool::new();
        pool.register("worker-1", None).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        pool.set_turn_complete_callback(Arc::new(move |_id| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }))
        .await;

        pool.assign_task("worker-1").await.unwrap();
        pool.complete_task("worker-1").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let record = pool.get_worker("worker-1").await.unwrap();
        assert_eq!(record.status, WorkerStatus::Ready);
    }

    #[tokio::test]
    async fn retire_fires_callback_once_and_is_idempotent() {
        let pool = WorkerPool::new();
        pool.register("worker-1", None).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        pool.set_retire_callback(Arc::new(move |_id| {
            let calls_clone = Arc::clone(&calls_clone);
            Box::pin(async move {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        }))
        .await;

        pool.retire("worker-1").await.unwrap();
        pool.retire("worker-1").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn active_workers_excludes_retired() {
        let pool = WorkerPool::new();
        pool.register("worker-1", None).unwrap();
        pool.register("worker-2", None).unwrap();
        pool.retire("worker-2").await.unwrap();

        let active = pool.active_workers().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "worker-1");
    }

    #[tokio::test]
    async fn close_retires_every_worker() {
        let pool = WorkerPool::new();
        pool.register("worker-1", None).unwrap();
        pool.register("worker-2", None).unwrap();
        pool.close().await;
        assert_eq!(pool.active_workers().await.len(), 0);
    }

    #[tokio::test]
    async fn unknown_worker_operations_error() {
        let pool = WorkerPool::new();
        assert!(pool.assign_task("ghost").await.is_err());
        assert!(pool.complete_task("ghost").await.is_err());
        assert!(pool.retire("ghost").await.is_err());
    }
}
