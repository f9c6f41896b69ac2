//! Unified error type for the kernel primitives.

/// Errors produced by the queue, broker, message log, and deduplicator.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    // -- Queue errors ---------------------------------------------------
    /// The queue has reached its configured capacity.
    #[error("queue is full (max {max_size})")]
    QueueFull { max_size: usize },

    // -- Broker errors ----------------------------------------------------
    /// Publishing failed for reasons other than a full subscriber buffer
    /// (a full buffer silently drops the event instead of erroring).
    #[error("broker publish failed: {reason}")]
    PublishFailed { reason: String },

    // -- Generic ------------------------------------------------------------
    /// Catch-all for unexpected internal errors.
    #[error("internal kernel error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, KernelError>;
