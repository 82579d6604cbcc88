use async_trait::async_trait;
use order_engine_types::OrderPayload;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::QueueClock;
use crate::job::{
    EnqueueResult, Job, JobLease, JobOutcome, JobState, OutcomeReport, QueueCounts, QueueError,
    QueueOptions,
};
use crate::queue::JobQueue;

#[derive(Debug, Default)]
struct QueueState {
    jobs: HashMap<String, Job>,
    next_sequence: u64,
}

impl QueueState {
    /// Drop the oldest finished jobs in `state` beyond `keep`
    fn evict(&mut self, state: JobState, keep: usize) -> usize {
        let mut finished: Vec<(u64, u64, String)> = self
            .jobs
            .values()
            .filter(|job| job.state == state)
            .map(|job| (job.finished_at.unwrap_or(job.updated_at), job.sequence, job.id.clone()))
            .collect();

        if finished.len() <= keep {
            return 0;
        }

        finished.sort();
        let excess = finished.len() - keep;
        for (_, _, id) in finished.into_iter().take(excess) {
            self.jobs.remove(&id);
        }
        excess
    }
}

/// Single-process queue backed by a map
pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
    options: QueueOptions,
    clock: QueueClock,
    ready: Arc<Notify>,
    available: AtomicBool,
}

impl InMemoryJobQueue {
    pub fn new(options: QueueOptions) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            options,
            clock: QueueClock::new(),
            ready: Arc::new(Notify::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the backing store going away (for testing)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), QueueError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(QueueError::Unavailable("in-memory queue marked unavailable".to_string()))
        }
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new(QueueOptions::default())
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job_id: &str, payload: &OrderPayload) -> Result<EnqueueResult, QueueError> {
        self.check_available()?;
        let now = self.clock.now_ms();
        let mut state = self.state.lock().await;

        if let Some(existing) = state.jobs.get(job_id) {
            if !existing.state.is_terminal() {
                debug!(job_id = %job_id, state = %existing.state, "Job already queued");
                return Ok(EnqueueResult::AlreadyQueued);
            }
            info!(job_id = %job_id, previous = %existing.state, "Replacing finished job");
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        let job = Job::new(job_id, payload.clone(), self.options.max_attempts, sequence, now);
        state.jobs.insert(job_id.to_string(), job);
        drop(state);

        self.ready.notify_one();
        Ok(EnqueueResult::Accepted)
    }

    async fn try_dequeue(&self, worker_id: &str) -> Result<Option<JobLease>, QueueError> {
        self.check_available()?;
        let now = self.clock.now_ms();
        let mut state = self.state.lock().await;

        let next = state
            .jobs
            .values()
            .filter(|job| job.is_ready(now))
            .min_by_key(|job| (job.ready_at, job.sequence))
            .map(|job| job.id.clone());

        let Some(job_id) = next else {
            return Ok(None);
        };

        let lease = state.jobs.get_mut(&job_id).map(|job| {
            job.activate(
                worker_id,
                Uuid::new_v4().to_string(),
                self.options.visibility_timeout,
                now,
            )
        });
        Ok(lease)
    }

    async fn report_outcome(&self, lease: &JobLease, outcome: JobOutcome) -> Result<OutcomeReport, QueueError> {
        self.check_available()?;
        let now = self.clock.now_ms();
        let mut state = self.state.lock().await;

        let job = match state.jobs.get_mut(&lease.job_id) {
            Some(job) if job.holds(lease) => job,
            _ => {
                return Err(QueueError::LeaseLost {
                    job_id: lease.job_id.clone(),
                })
            }
        };

        let report = job.apply_outcome(outcome, &self.options.backoff, now);
        let job_state = job.state;

        if let Some(keep) = self.options.retention(job_state) {
            let evicted = state.evict(job_state, keep);
            if evicted > 0 {
                debug!(state = %job_state, evicted, "Evicted finished jobs");
            }
        }
        drop(state);

        if matches!(report, OutcomeReport::RetryScheduled { .. }) {
            self.ready.notify_one();
        }
        Ok(report)
    }

    async fn release(&self, lease: &JobLease) -> Result<(), QueueError> {
        self.check_available()?;
        let now = self.clock.now_ms();
        let mut state = self.state.lock().await;

        match state.jobs.get_mut(&lease.job_id) {
            Some(job) if job.holds(lease) => job.reset_to_waiting(now),
            _ => {
                return Err(QueueError::LeaseLost {
                    job_id: lease.job_id.clone(),
                })
            }
        }
        drop(state);

        self.ready.notify_one();
        Ok(())
    }

    async fn recover_expired(&self) -> Result<usize, QueueError> {
        self.check_available()?;
        let now = self.clock.now_ms();
        let mut state = self.state.lock().await;

        let mut recovered = 0;
        for job in state.jobs.values_mut() {
            let expired = job.state == JobState::Active
                && job.lease.as_ref().map(|l| l.expires_at <= now).unwrap_or(true);
            if expired {
                warn!(job_id = %job.id, "Recovering job with expired lease");
                job.reset_to_waiting(now);
                recovered += 1;
            }
        }
        drop(state);

        if recovered > 0 {
            self.ready.notify_waiters();
        }
        Ok(recovered)
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, QueueError> {
        self.check_available()?;
        Ok(self.state.lock().await.jobs.get(job_id).cloned())
    }

    async fn counts(&self) -> Result<QueueCounts, QueueError> {
        self.check_available()?;
        let state = self.state.lock().await;
        let mut counts = QueueCounts::default();
        for job in state.jobs.values() {
            counts.add(job.state, 1);
        }
        Ok(counts)
    }

    fn options(&self) -> &QueueOptions {
        &self.options
    }

    fn ready_signal(&self) -> Arc<Notify> {
        self.ready.clone()
    }
}
