use order_engine_ratelimit::ExponentialBackoff;
use order_engine_types::OrderPayload;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════
// JOB TYPES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Delayed => "delayed",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(JobState::Waiting),
            "delayed" => Ok(JobState::Delayed),
            "active" => Ok(JobState::Active),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(QueueError::Corrupt(format!("unknown job state: {other}"))),
        }
    }
}

/// Lease held by the worker currently running a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseInfo {
    pub token: String,
    pub worker_id: String,
    pub expires_at: u64,
}

/// Queued unit of work, keyed by order id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub payload: OrderPayload,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub state: JobState,
    pub failed_reason: Option<String>,

    /// Earliest time a `Delayed` job may be leased (Unix millis)
    pub ready_at: u64,

    pub lease: Option<LeaseInfo>,

    /// Insertion order, used to break ties between equally ready jobs
    pub sequence: u64,

    pub created_at: u64,
    pub updated_at: u64,
    pub finished_at: Option<u64>,
}

impl Job {
    pub fn new(id: impl Into<String>, payload: OrderPayload, max_attempts: u32, sequence: u64, now: u64) -> Self {
        Self {
            id: id.into(),
            payload,
            attempts_made: 0,
            max_attempts,
            state: JobState::Waiting,
            failed_reason: None,
            ready_at: now,
            lease: None,
            sequence,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn is_ready(&self, now: u64) -> bool {
        match self.state {
            JobState::Waiting => true,
            JobState::Delayed => self.ready_at <= now,
            _ => false,
        }
    }

    /// Mark the job active under a fresh lease
    pub fn activate(&mut self, worker_id: &str, token: String, visibility_timeout: Duration, now: u64) -> JobLease {
        let expires_at = now.saturating_add(visibility_timeout.as_millis() as u64);
        self.state = JobState::Active;
        self.lease = Some(LeaseInfo {
            token: token.clone(),
            worker_id: worker_id.to_string(),
            expires_at,
        });
        self.updated_at = now;

        JobLease {
            job_id: self.id.clone(),
            token,
            worker_id: worker_id.to_string(),
            attempt: self.attempts_made + 1,
            payload: self.payload.clone(),
            expires_at,
        }
    }

    /// Whether `lease` is the one currently holding this job
    pub fn holds(&self, lease: &JobLease) -> bool {
        self.state == JobState::Active
            && self
                .lease
                .as_ref()
                .map(|held| held.token == lease.token)
                .unwrap_or(false)
    }

    /// Return an active job to the waiting set without consuming an attempt
    pub fn reset_to_waiting(&mut self, now: u64) {
        self.state = JobState::Waiting;
        self.lease = None;
        self.ready_at = now;
        self.updated_at = now;
    }

    /// Record the outcome of the current attempt
    pub fn apply_outcome(&mut self, outcome: JobOutcome, backoff: &ExponentialBackoff, now: u64) -> OutcomeReport {
        self.lease = None;
        self.updated_at = now;

        match outcome {
            JobOutcome::Success => {
                self.attempts_made += 1;
                self.state = JobState::Completed;
                self.failed_reason = None;
                self.finished_at = Some(now);
                OutcomeReport::Completed
            }
            JobOutcome::RetryableFailure(reason) => {
                self.attempts_made += 1;
                self.failed_reason = Some(reason.clone());
                if self.attempts_made < self.max_attempts {
                    let delay = backoff.delay_for_attempt(self.attempts_made);
                    self.state = JobState::Delayed;
                    self.ready_at = now.saturating_add(delay.as_millis() as u64);
                    OutcomeReport::RetryScheduled {
                        attempt: self.attempts_made,
                        delay,
                    }
                } else {
                    self.state = JobState::Failed;
                    self.finished_at = Some(now);
                    OutcomeReport::Exhausted {
                        attempts: self.attempts_made,
                        reason,
                    }
                }
            }
            JobOutcome::FatalFailure(reason) => {
                self.attempts_made += 1;
                self.state = JobState::Failed;
                self.failed_reason = Some(reason.clone());
                self.finished_at = Some(now);
                OutcomeReport::Failed { reason }
            }
        }
    }
}

/// Proof of exclusive execution rights for one attempt of a job
#[derive(Debug, Clone, PartialEq)]
pub struct JobLease {
    pub job_id: String,
    pub token: String,
    pub worker_id: String,

    /// 1-based number of the attempt this lease runs
    pub attempt: u32,

    pub payload: OrderPayload,
    pub expires_at: u64,
}

/// Result of one run of a job, as classified by the executor
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Success,
    RetryableFailure(String),
    FatalFailure(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    Accepted,
    AlreadyQueued,
}

/// What the queue did with a reported outcome
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeReport {
    Completed,
    RetryScheduled { attempt: u32, delay: Duration },
    Exhausted { attempts: u32, reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub waiting: usize,
    pub delayed: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueCounts {
    pub fn total(&self) -> usize {
        self.waiting + self.delayed + self.active + self.completed + self.failed
    }

    pub(crate) fn add(&mut self, state: JobState, n: usize) {
        match state {
            JobState::Waiting => self.waiting += n,
            JobState::Delayed => self.delayed += n,
            JobState::Active => self.active += n,
            JobState::Completed => self.completed += n,
            JobState::Failed => self.failed += n,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub max_attempts: u32,
    pub backoff: ExponentialBackoff,

    /// Completed jobs retained for inspection
    pub keep_completed: usize,

    /// Failed jobs retained for inspection
    pub keep_failed: usize,

    /// How long a lease stays valid before `recover_expired` reclaims it
    pub visibility_timeout: Duration,

    /// Upper bound on how long an idle `dequeue_next` sleeps between checks
    pub poll_interval: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: ExponentialBackoff::new(Duration::from_secs(2)),
            keep_completed: 100,
            keep_failed: 50,
            visibility_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl QueueOptions {
    pub fn retention(&self, state: JobState) -> Option<usize> {
        match state {
            JobState::Completed => Some(self.keep_completed),
            JobState::Failed => Some(self.keep_failed),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ERROR TYPES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("lease lost for job {job_id}")]
    LeaseLost { job_id: String },

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("corrupt job record: {0}")]
    Corrupt(String),
}
