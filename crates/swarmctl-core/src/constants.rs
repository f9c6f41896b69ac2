//! Timing constants referenced throughout the coordinator core.

use std::time::Duration;

/// A worker holding a task for longer than this is reported as stuck by
/// [`crate::detection::check_stuck_workers`]. Fixed as a single named
/// constant rather than made configurable, since no config-loading layer
/// exists in this workspace.
pub const MAX_TASK_DURATION: Duration = Duration::from_secs(60 * 60);

/// How long [`crate::queue_manager::QueueManager`] waits for a burst of
/// queue-count changes to settle before publishing a single coalesced
/// event.
pub const QUEUE_EVENT_DEBOUNCE_INTERVAL: Duration = Duration::from_millis(100);

/// Default bound on a single worker's pending-message queue.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = swarmctl_kernel::queue::DEFAULT_MAX_QUEUE_SIZE;
