//! Durable job queue for order execution
//!
//! Jobs are keyed by order id. A worker leases a ready job, runs it and
//! reports the outcome; retryable failures are rescheduled with exponential
//! backoff until the attempt budget is spent. Leases expire after the
//! visibility timeout so a crashed worker's job is picked up again by
//! `recover_expired`.

pub mod clock;
pub mod job;
pub mod memory;
pub mod queue;
pub mod sqlite;

pub use clock::QueueClock;
pub use job::{
    EnqueueResult, Job, JobLease, JobOutcome, JobState, LeaseInfo, OutcomeReport, QueueCounts,
    QueueError, QueueOptions,
};
pub use memory::InMemoryJobQueue;
pub use queue::JobQueue;
pub use sqlite::SqliteJobQueue;
