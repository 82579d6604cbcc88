use order_engine_ratelimit::RateLimitError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerPoolConfig {
    /// Worker tasks, each holding at most one lease
    pub concurrency: usize,

    /// Job starts admitted per `rate_window`
    pub rate_limit: u32,
    pub rate_window: Duration,

    /// How often expired leases are reclaimed
    pub reaper_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            rate_limit: 100,
            rate_window: Duration::from_secs(60),
            reaper_interval: Duration::from_secs(5),
        }
    }
}

impl WorkerPoolConfig {
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.concurrency == 0 {
            return Err(PoolError::InvalidConfig("concurrency must be positive".to_string()));
        }
        if self.reaper_interval.is_zero() {
            return Err(PoolError::InvalidConfig("reaper interval must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid worker pool configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
}
