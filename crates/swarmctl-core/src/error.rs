//! Unified error type for the coordinator state core.

/// Broad classification used to decide how an error surfaces at the MCP
/// layer (tool error body vs. RPC error vs. log-and-continue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Precondition,
    External,
    Protocol,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    // -- Validation -----------------------------------------------------
    #[error("invalid task_id format: {task_id}")]
    InvalidTaskId { task_id: String },

    #[error("worker_id is required")]
    MissingWorkerId,

    #[error("message is required")]
    MissingMessage,

    #[error("worker not found: {worker_id}")]
    WorkerNotFound { worker_id: String },

    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: String },

    #[error("no session ID for worker {worker_id}")]
    NoSessionId { worker_id: String },

    // -- Precondition -----------------------------------------------------
    #[error("worker {worker_id} already has an assignment")]
    WorkerAlreadyAssigned { worker_id: String },

    #[error("task {task_id} is already assigned")]
    TaskAlreadyAssigned { task_id: String },

    #[error("worker {worker_id} is not ready")]
    WorkerNotReady { worker_id: String },

    #[error("reviewer cannot be the same worker as the implementer: {worker_id}")]
    SelfReviewRejected { worker_id: String },

    #[error("task {task_id} is not in the expected status (expected {expected}, found {found})")]
    UnexpectedTaskStatus {
        task_id: String,
        expected: String,
        found: String,
    },

    #[error("worker {worker_id} is not in the expected phase (expected one of {expected}, found {found})")]
    UnexpectedWorkerPhase {
        worker_id: String,
        expected: String,
        found: String,
    },

    #[error("queue full for worker {worker_id}")]
    QueueFull { worker_id: String },

    #[error("observer can only send/reply in #observer channel")]
    ObserverChannelRestricted,

    // -- External (must-succeed) -------------------------------------------
    #[error("failed to get task info for {task_id}: {reason}")]
    TaskInfoUnavailable { task_id: String, reason: String },

    #[error("failed to update task status for {task_id}: {reason}")]
    TaskStatusUpdateFailed { task_id: String, reason: String },

    #[error("failed to resume worker session for {worker_id}: {reason}")]
    SessionResumeFailed { worker_id: String, reason: String },

    // -- Internal -------------------------------------------------------
    #[error("kernel error: {0}")]
    Kernel(#[from] swarmctl_kernel::KernelError),

    #[error("pool error: {0}")]
    Pool(#[from] swarmctl_pool::PoolError),

    #[error("internal coordinator error: {0}")]
    Internal(String),
}

impl CoordinatorError {
    /// Classify this error for the MCP/error-propagation layer (§7).
    pub fn kind(&self) -> ErrorKind {
        use CoordinatorError::*;
        match self {
            InvalidTaskId { .. }
            | MissingWorkerId
            | MissingMessage
            | WorkerNotFound { .. }
            | TaskNotFound { .. }
            | NoSessionId { .. } => ErrorKind::Validation,

            WorkerAlreadyAssigned { .. }
            | TaskAlreadyAssigned { .. }
            | WorkerNotReady { .. }
            | SelfReviewRejected { .. }
            | UnexpectedTaskStatus { .. }
            | UnexpectedWorkerPhase { .. }
            | QueueFull { .. }
            | ObserverChannelRestricted => ErrorKind::Precondition,

            TaskInfoUnavailable { .. }
            | TaskStatusUpdateFailed { .. }
            | SessionResumeFailed { .. } => ErrorKind::External,

            Kernel(_) | Pool(_) => ErrorKind::Internal,
            Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
