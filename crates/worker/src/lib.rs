//! Worker pool
//!
//! A fixed number of worker tasks wait until the rolling-window limiter has
//! room, lease a job, take the start slot, run the job through a
//! `JobExecutor` and report the outcome. A reaper task returns jobs with
//! expired leases to the queue.

pub mod config;
pub mod pool;

pub use config::{PoolError, WorkerPoolConfig};
pub use pool::{PoolStats, StopReport, WorkerPool};
