use async_trait::async_trait;
use order_engine_types::OrderPayload;
use std::sync::Arc;
use tokio::sync::{watch, Notify};

use crate::job::{
    EnqueueResult, Job, JobLease, JobOutcome, OutcomeReport, QueueCounts, QueueError, QueueOptions,
};

/// Job queue trait - can be implemented for different backends
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Add a job keyed by order id.
    ///
    /// A job with the same id that has not finished yet is left untouched and
    /// `AlreadyQueued` is returned. A finished job with the same id is
    /// replaced by a fresh one.
    async fn enqueue(&self, job_id: &str, payload: &OrderPayload) -> Result<EnqueueResult, QueueError>;

    /// Lease the oldest ready job, if any
    async fn try_dequeue(&self, worker_id: &str) -> Result<Option<JobLease>, QueueError>;

    /// Record the outcome of a leased attempt
    async fn report_outcome(&self, lease: &JobLease, outcome: JobOutcome) -> Result<OutcomeReport, QueueError>;

    /// Hand an unstarted lease back without consuming an attempt
    async fn release(&self, lease: &JobLease) -> Result<(), QueueError>;

    /// Return jobs whose lease expired to the waiting set
    async fn recover_expired(&self) -> Result<usize, QueueError>;

    async fn get(&self, job_id: &str) -> Result<Option<Job>, QueueError>;

    async fn counts(&self) -> Result<QueueCounts, QueueError>;

    fn options(&self) -> &QueueOptions;

    /// Signalled whenever a job becomes ready
    fn ready_signal(&self) -> Arc<Notify>;

    /// Wait for a job to lease, or `None` once `shutdown` flips to true.
    async fn dequeue_next(
        &self,
        worker_id: &str,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Option<JobLease>, QueueError> {
        let ready = self.ready_signal();
        let poll_interval = self.options().poll_interval;

        loop {
            if *shutdown.borrow() {
                return Ok(None);
            }

            if let Some(lease) = self.try_dequeue(worker_id).await? {
                return Ok(Some(lease));
            }

            tokio::select! {
                _ = ready.notified() => {}
                _ = tokio::time::sleep(poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return Ok(None);
                    }
                }
            }
        }
    }
}
