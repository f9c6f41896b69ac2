//! Worker lifecycle pool for swarmctl.
//!
//! Tracks each worker's `Ready | Working | Retired` status and fires
//! registered callbacks on turn completion and retirement. See
//! [`pool::WorkerPool`] for the full API.

pub mod error;
pub mod pool;

pub use error::{PoolError, Result};
pub use pool::{RetireSink, TurnCompleteSink, WorkerPool, WorkerRecord, WorkerStatus};
