use async_trait::async_trait;
use order_engine_types::OrderPayload;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::QueueClock;
use crate::job::{
    EnqueueResult, Job, JobLease, JobOutcome, JobState, LeaseInfo, OutcomeReport, QueueCounts,
    QueueError, QueueOptions,
};
use crate::queue::JobQueue;

const CREATE_JOBS: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    payload TEXT NOT NULL,
    attempts_made INTEGER NOT NULL,
    max_attempts INTEGER NOT NULL,
    state TEXT NOT NULL,
    failed_reason TEXT,
    ready_at INTEGER NOT NULL,
    lease_token TEXT,
    lease_worker TEXT,
    lease_expires_at INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    finished_at INTEGER
)
"#;

const CREATE_JOBS_READY_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_jobs_ready ON jobs (state, ready_at, seq)";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ═══════════════════════════════════════════════════════════════════════════
// SQLITE QUEUE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════

/// Durable queue; waiting and delayed jobs survive a restart
pub struct SqliteJobQueue {
    pool: SqlitePool,
    options: QueueOptions,
    clock: QueueClock,
    ready: Arc<Notify>,
}

impl SqliteJobQueue {
    /// Open (creating if missing) the queue database at `db_path`
    pub async fn new<P: AsRef<Path>>(db_path: P, options: QueueOptions) -> Result<Self, QueueError> {
        // WAL lets readers run beside the single writer; writers queue on
        // the busy timeout instead of failing with SQLITE_BUSY
        let connect = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .connect_with(connect)
            .await
            .map_err(unavailable)?;

        info!(path = %db_path.as_ref().display(), "Opened job queue");
        Self::with_pool(pool, options).await
    }

    /// Create an in-memory SQLite queue (for testing)
    pub async fn in_memory(options: QueueOptions) -> Result<Self, QueueError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(unavailable)?;

        Self::with_pool(pool, options).await
    }

    pub async fn with_pool(pool: SqlitePool, options: QueueOptions) -> Result<Self, QueueError> {
        for statement in [CREATE_JOBS, CREATE_JOBS_READY_INDEX] {
            sqlx::query(statement).execute(&pool).await.map_err(unavailable)?;
        }

        Ok(Self {
            pool,
            options,
            clock: QueueClock::new(),
            ready: Arc::new(Notify::new()),
        })
    }

    fn row_to_job(row: &SqliteRow) -> Result<Job, QueueError> {
        let payload: String = row.get("payload");
        let payload: OrderPayload =
            serde_json::from_str(&payload).map_err(|e| QueueError::Corrupt(e.to_string()))?;
        let state: String = row.get("state");

        let lease = match (
            row.get::<Option<String>, _>("lease_token"),
            row.get::<Option<String>, _>("lease_worker"),
            row.get::<Option<i64>, _>("lease_expires_at"),
        ) {
            (Some(token), Some(worker_id), Some(expires_at)) => Some(LeaseInfo {
                token,
                worker_id,
                expires_at: expires_at as u64,
            }),
            _ => None,
        };

        Ok(Job {
            id: row.get("id"),
            payload,
            attempts_made: row.get::<i64, _>("attempts_made") as u32,
            max_attempts: row.get::<i64, _>("max_attempts") as u32,
            state: JobState::from_str(&state)?,
            failed_reason: row.get("failed_reason"),
            ready_at: row.get::<i64, _>("ready_at") as u64,
            lease,
            sequence: row.get::<i64, _>("seq") as u64,
            created_at: row.get::<i64, _>("created_at") as u64,
            updated_at: row.get::<i64, _>("updated_at") as u64,
            finished_at: row.get::<Option<i64>, _>("finished_at").map(|v| v as u64),
        })
    }
}

fn unavailable(e: sqlx::Error) -> QueueError {
    QueueError::Unavailable(e.to_string())
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, job_id: &str, payload: &OrderPayload) -> Result<EnqueueResult, QueueError> {
        let now = self.clock.now_ms() as i64;
        let payload_json =
            serde_json::to_string(payload).map_err(|e| QueueError::Corrupt(e.to_string()))?;

        // every statement here is a single write; a live job with the same
        // id survives the delete and makes the insert fail on UNIQUE
        let replaced = sqlx::query(
            "DELETE FROM jobs WHERE id = ? AND state IN ('completed', 'failed')",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?
        .rows_affected();

        if replaced > 0 {
            info!(job_id = %job_id, "Replacing finished job");
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO jobs (
                id, payload, attempts_made, max_attempts, state, ready_at, created_at, updated_at
            ) VALUES (?, ?, 0, ?, 'waiting', ?, ?, ?)
            "#,
        )
        .bind(job_id)
        .bind(payload_json)
        .bind(self.options.max_attempts as i64)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!(job_id = %job_id, "Job already queued");
                return Ok(EnqueueResult::AlreadyQueued);
            }
            Err(e) => return Err(unavailable(e)),
        }

        self.ready.notify_one();
        Ok(EnqueueResult::Accepted)
    }

    async fn try_dequeue(&self, worker_id: &str) -> Result<Option<JobLease>, QueueError> {
        let now = self.clock.now_ms();
        let token = Uuid::new_v4().to_string();
        let expires_at = now.saturating_add(self.options.visibility_timeout.as_millis() as u64);

        // single statement, so two workers can never lease the same row
        let row = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'active', lease_token = ?, lease_worker = ?, lease_expires_at = ?, updated_at = ?
            WHERE seq = (
                SELECT seq FROM jobs
                WHERE state = 'waiting' OR (state = 'delayed' AND ready_at <= ?)
                ORDER BY ready_at, seq
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(&token)
        .bind(worker_id)
        .bind(expires_at as i64)
        .bind(now as i64)
        .bind(now as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let job = Self::row_to_job(&row)?;

        Ok(Some(JobLease {
            job_id: job.id,
            token,
            worker_id: worker_id.to_string(),
            attempt: job.attempts_made + 1,
            payload: job.payload,
            expires_at,
        }))
    }

    async fn report_outcome(&self, lease: &JobLease, outcome: JobOutcome) -> Result<OutcomeReport, QueueError> {
        let now = self.clock.now_ms();
        let lease_lost = || QueueError::LeaseLost {
            job_id: lease.job_id.clone(),
        };

        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
            .bind(&lease.job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        let mut job = match row.as_ref().map(Self::row_to_job).transpose()? {
            Some(job) if job.holds(lease) => job,
            _ => return Err(lease_lost()),
        };

        let report = job.apply_outcome(outcome, &self.options.backoff, now);

        // only the lease holder writes an active row, and recovery or release
        // clears the token, so matching on it makes the write conditional
        let written = sqlx::query(
            r#"
            UPDATE jobs
            SET attempts_made = ?, state = ?, failed_reason = ?, ready_at = ?,
                lease_token = NULL, lease_worker = NULL, lease_expires_at = NULL,
                updated_at = ?, finished_at = ?
            WHERE id = ? AND state = 'active' AND lease_token = ?
            "#,
        )
        .bind(job.attempts_made as i64)
        .bind(job.state.as_str())
        .bind(&job.failed_reason)
        .bind(job.ready_at as i64)
        .bind(job.updated_at as i64)
        .bind(job.finished_at.map(|v| v as i64))
        .bind(&job.id)
        .bind(&lease.token)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?
        .rows_affected();

        if written == 0 {
            return Err(lease_lost());
        }

        if let Some(keep) = self.options.retention(job.state) {
            let evicted = sqlx::query(
                r#"
                DELETE FROM jobs
                WHERE state = ?1 AND seq NOT IN (
                    SELECT seq FROM jobs WHERE state = ?1
                    ORDER BY finished_at DESC, seq DESC
                    LIMIT ?2
                )
                "#,
            )
            .bind(job.state.as_str())
            .bind(keep as i64)
            .execute(&self.pool)
            .await;

            // the outcome is already recorded; a failed trim is retried next time
            match evicted {
                Ok(result) if result.rows_affected() > 0 => {
                    debug!(state = %job.state, evicted = result.rows_affected(), "Evicted finished jobs");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Failed to evict finished jobs"),
            }
        }

        if matches!(report, OutcomeReport::RetryScheduled { .. }) {
            self.ready.notify_one();
        }
        Ok(report)
    }

    async fn release(&self, lease: &JobLease) -> Result<(), QueueError> {
        let now = self.clock.now_ms() as i64;

        let released = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'waiting', lease_token = NULL, lease_worker = NULL, lease_expires_at = NULL,
                ready_at = ?, updated_at = ?
            WHERE id = ? AND state = 'active' AND lease_token = ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(&lease.job_id)
        .bind(&lease.token)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?
        .rows_affected();

        if released == 0 {
            return Err(QueueError::LeaseLost {
                job_id: lease.job_id.clone(),
            });
        }

        self.ready.notify_one();
        Ok(())
    }

    async fn recover_expired(&self) -> Result<usize, QueueError> {
        let now = self.clock.now_ms() as i64;

        let recovered = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'waiting', lease_token = NULL, lease_worker = NULL, lease_expires_at = NULL,
                ready_at = ?, updated_at = ?
            WHERE state = 'active' AND (lease_expires_at IS NULL OR lease_expires_at <= ?)
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?
        .rows_affected() as usize;

        if recovered > 0 {
            warn!(recovered, "Recovered jobs with expired leases");
            self.ready.notify_waiters();
        }
        Ok(recovered)
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, QueueError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn counts(&self) -> Result<QueueCounts, QueueError> {
        let rows = sqlx::query("SELECT state, COUNT(*) AS n FROM jobs GROUP BY state")
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        let mut counts = QueueCounts::default();
        for row in rows {
            let state: String = row.get("state");
            let n: i64 = row.get("n");
            counts.add(JobState::from_str(&state)?, n as usize);
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
