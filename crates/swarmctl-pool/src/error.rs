//! Errors produced by the worker pool.

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("worker not found: {worker_id}")]
    WorkerNotFound { worker_id: String },

    #[error("worker {worker_id} is already retired")]
    AlreadyRetired { worker_id: String },

    #[error("worker {worker_id} already registered")]
    AlreadyRegistered { worker_id: String },
}

pub type Result<T> = std::result::Result<T, PoolError>;
