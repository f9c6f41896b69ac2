//! Coordinator state core.
//!
//! This crate is C7 + C8 of the coordinator: the per-task/per-worker
//! assignment state machine (`coordinator`), the per-worker queue manager
//! (`queue_manager`), orphan/stuck detection (`detection`), task-id
//! validation (`task_id`), and the contracts for the two external
//! collaborators the coordinator calls into (`collaborators`).
//!
//! Built on top of `swarmctl-kernel` (queue, broker, message log,
//! deduplicator) and `swarmctl-pool` (worker lifecycle). Knows nothing
//! about JSON-RPC or MCP -- see `swarmctl-mcp` for that layer.

pub mod collaborators;
pub mod constants;
pub mod coordinator;
pub mod detection;
pub mod error;
pub mod queue_manager;
pub mod task_id;
pub mod types;

pub use collaborators::{Executor, LlmDriver, NoopExecutor, NoopLlmDriver, TaskInfo};
pub use constants::{DEFAULT_MAX_QUEUE_SIZE, MAX_TASK_DURATION, QUEUE_EVENT_DEBOUNCE_INTERVAL};
pub use coordinator::{CoordinatorState, WorkerSnapshot};
pub use error::{CoordinatorError, ErrorKind, Result};
pub use queue_manager::{QueueManager, QueuedMessage, SendOutcome, WorkerQueueChanged};
pub use task_id::is_valid_task_id;
pub use types::{
    ReviewVerdict, TaskAssignment, TaskStatus, WorkerAssignment, WorkerPhase, WorkerRole,
};
