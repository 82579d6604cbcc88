use order_engine_metrics::{JobSpan, MetricsCollector};
use order_engine_pipeline::JobExecutor;
use order_engine_queue::{JobLease, JobOutcome, JobQueue, OutcomeReport, QueueError};
use order_engine_ratelimit::RateLimiter;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn, Instrument};

use crate::config::{PoolError, WorkerPoolConfig};

const JOB_STARTS: &str = "job_starts";

/// Snapshot of pool activity since start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub started: u64,
    pub completed: u64,
    pub retried: u64,
    pub failed: u64,
    pub in_flight: usize,
}

/// Result of stopping the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopReport {
    /// Every worker finished its current job before the deadline
    pub drained: bool,

    /// Workers aborted at the deadline; their leases expire and are recovered
    pub abandoned: usize,
}

#[derive(Default)]
struct Counters {
    started: AtomicU64,
    completed: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    in_flight: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> PoolStats {
        PoolStats {
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
        }
    }
}

struct WorkerContext {
    queue: Arc<dyn JobQueue>,
    executor: Arc<dyn JobExecutor>,
    limiter: RateLimiter,
    counters: Arc<Counters>,
    metrics: MetricsCollector,
}

/// Fixed set of worker tasks draining the job queue
pub struct WorkerPool {
    config: WorkerPoolConfig,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
    reaper: JoinHandle<()>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Spawn `config.concurrency` workers and the lease reaper
    pub fn start(
        config: WorkerPoolConfig,
        queue: Arc<dyn JobQueue>,
        executor: Arc<dyn JobExecutor>,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        let limiter = RateLimiter::new().with_limit(JOB_STARTS, config.rate_limit, config.rate_window)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(Counters::default());
        let context = Arc::new(WorkerContext {
            queue: queue.clone(),
            executor,
            limiter,
            counters: counters.clone(),
            metrics: MetricsCollector::new(),
        });

        let workers = (0..config.concurrency)
            .map(|n| {
                let worker_id = format!("worker-{n}");
                tokio::spawn(run_worker(context.clone(), worker_id, shutdown_rx.clone()))
            })
            .collect();
        let reaper = tokio::spawn(run_reaper(queue, config.reaper_interval, shutdown_rx));

        info!(
            concurrency = config.concurrency,
            rate_limit = config.rate_limit,
            rate_window = ?config.rate_window,
            "Worker pool started"
        );

        Ok(Self {
            config,
            shutdown_tx,
            workers,
            reaper,
            counters,
        })
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// Signal shutdown and wait for workers to finish their current job.
    ///
    /// Workers still running when `timeout` elapses are aborted.
    pub async fn stop(self, timeout: Duration) -> StopReport {
        info!(timeout = ?timeout, in_flight = self.counters.in_flight.load(Ordering::Relaxed), "Stopping worker pool");
        let _ = self.shutdown_tx.send(true);

        let deadline = Instant::now() + timeout;
        let mut reaper = self.reaper;
        let mut abandoned = 0;
        for mut handle in self.workers {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "Worker task panicked"),
                Err(_) => {
                    handle.abort();
                    abandoned += 1;
                }
            }
        }

        if tokio::time::timeout_at(deadline, &mut reaper).await.is_err() {
            debug!("Lease reaper did not stop in time");
            reaper.abort();
        }

        let report = StopReport {
            drained: abandoned == 0,
            abandoned,
        };
        if report.drained {
            info!("Worker pool drained");
        } else {
            warn!(abandoned, "Worker pool stopped with jobs still running");
        }
        report
    }
}

async fn run_worker(ctx: Arc<WorkerContext>, worker_id: String, mut shutdown: watch::Receiver<bool>) {
    debug!(worker_id = %worker_id, "Worker started");
    let poll_interval = ctx.queue.options().poll_interval;

    loop {
        // no lease is held while the start window is full, so a window
        // longer than the visibility timeout cannot expire it
        let capacity = tokio::select! {
            _ = ctx.limiter.wait_available(JOB_STARTS) => true,
            _ = shutdown_signalled(&mut shutdown) => false,
        };
        if !capacity {
            break;
        }

        let lease = match ctx.queue.dequeue_next(&worker_id, &mut shutdown).await {
            Ok(Some(lease)) => lease,
            Ok(None) => break,
            Err(e) => {
                warn!(worker_id = %worker_id, error = %e, "Dequeue failed");
                let stopping = tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => false,
                    _ = shutdown_signalled(&mut shutdown) => true,
                };
                if stopping {
                    break;
                }
                continue;
            }
        };

        if !ctx.limiter.try_acquire(JOB_STARTS) {
            // another worker took the slot: hand the job back without
            // spending an attempt and wait for the window again
            debug!(worker_id = %worker_id, order_id = %lease.job_id, "Start slot taken, releasing lease");
            if let Err(e) = ctx.queue.release(&lease).await {
                warn!(order_id = %lease.job_id, error = %e, "Failed to release lease");
            }
            continue;
        }

        let span = JobSpan::new(&lease.job_id, &worker_id, lease.attempt).span();
        run_job(&ctx, lease).instrument(span).await;
    }

    debug!(worker_id = %worker_id, "Worker stopped");
}

async fn run_job(ctx: &WorkerContext, lease: JobLease) {
    ctx.counters.started.fetch_add(1, Ordering::Relaxed);
    ctx.counters.in_flight.fetch_add(1, Ordering::Relaxed);
    ctx.metrics.record_job_started();
    let started = Instant::now();

    info!("Job started");
    let outcome = ctx.executor.run_job(&lease).await;
    let label = match &outcome {
        JobOutcome::Success => "completed",
        JobOutcome::RetryableFailure(_) => "retryable",
        JobOutcome::FatalFailure(_) => "fatal",
    };

    ctx.counters.in_flight.fetch_sub(1, Ordering::Relaxed);
    ctx.metrics.record_job_finished(label, started.elapsed());

    match ctx.queue.report_outcome(&lease, outcome).await {
        Ok(OutcomeReport::Completed) => {
            ctx.counters.completed.fetch_add(1, Ordering::Relaxed);
            info!(elapsed = ?started.elapsed(), "Job completed");
        }
        Ok(OutcomeReport::RetryScheduled { attempt, delay }) => {
            ctx.counters.retried.fetch_add(1, Ordering::Relaxed);
            info!(attempt, delay = ?delay, "Job scheduled for retry");
        }
        Ok(OutcomeReport::Exhausted { attempts, reason }) => {
            ctx.counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!(attempts, reason = %reason, "Job retries exhausted");
            ctx.executor.mark_exhausted(&lease.job_id, &reason).await;
        }
        Ok(OutcomeReport::Failed { reason }) => {
            ctx.counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!(reason = %reason, "Job failed");
        }
        Err(QueueError::LeaseLost { .. }) => {
            warn!("Lease expired before the outcome was recorded");
        }
        Err(e) => {
            error!(error = %e, "Failed to record job outcome");
        }
    }
}

async fn run_reaper(queue: Arc<dyn JobQueue>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let metrics = MetricsCollector::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_signalled(&mut shutdown) => break,
        }

        match queue.recover_expired().await {
            Ok(0) => {}
            Ok(recovered) => info!(recovered, "Recovered jobs with expired leases"),
            Err(e) => warn!(error = %e, "Lease recovery failed"),
        }

        if let Ok(counts) = queue.counts().await {
            metrics.set_queue_depth("waiting", counts.waiting);
            metrics.set_queue_depth("delayed", counts.delayed);
            metrics.set_queue_depth("active", counts.active);
        }
    }
}

/// Resolves once shutdown is requested or the pool is dropped
async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
