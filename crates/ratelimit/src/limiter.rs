use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error, PartialEq)]
pub enum RateLimitError {
    #[error("Rate limit exceeded for key: {0}")]
    LimitExceeded(String),
    #[error("Invalid rate limit configuration: {0}")]
    InvalidConfig(String),
}

/// Rolling window admitting at most `max` acquisitions in any `window` span.
#[derive(Debug)]
pub struct RollingWindow {
    max: u32,
    window: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl RollingWindow {
    pub fn new(max: u32, window: Duration) -> Result<Self, RateLimitError> {
        if max == 0 {
            return Err(RateLimitError::InvalidConfig("max must be positive".into()));
        }
        if window.is_zero() {
            return Err(RateLimitError::InvalidConfig("window must be positive".into()));
        }
        Ok(Self {
            max,
            window,
            starts: Mutex::new(VecDeque::with_capacity(max as usize)),
        })
    }

    fn prune(&self, starts: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = starts.front() {
            if now.duration_since(*oldest) >= self.window {
                starts.pop_front();
            } else {
                break;
            }
        }
    }

    /// Check for a free slot, taking it when `take` is set. On a full
    /// window, returns how long until the oldest slot expires.
    fn poll_slot(&self, take: bool) -> Result<(), Duration> {
        let now = Instant::now();
        let mut starts = self.starts.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut starts, now);

        if (starts.len() as u32) < self.max {
            if take {
                starts.push_back(now);
            }
            return Ok(());
        }

        let wait = starts
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or_default();
        Err(wait)
    }

    pub fn try_acquire(&self) -> bool {
        self.poll_slot(true).is_ok()
    }

    /// Wait until a slot is free, then take it.
    pub async fn acquire(&self) {
        self.wait_for_slot(true).await
    }

    /// Wait until a slot is free without taking it. Another caller may
    /// still claim the slot first.
    pub async fn wait_available(&self) {
        self.wait_for_slot(false).await
    }

    async fn wait_for_slot(&self, take: bool) {
        loop {
            match self.poll_slot(take) {
                Ok(()) => return,
                Err(wait) => tokio::time::sleep(wait.max(Duration::from_millis(1))).await,
            }
        }
    }

    pub fn remaining(&self) -> u32 {
        let mut starts = self.starts.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut starts, Instant::now());
        self.max.saturating_sub(starts.len() as u32)
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Per-key rolling-window limits. Unconfigured keys are unlimited.
#[derive(Debug, Default)]
pub struct RateLimiter {
    limits: HashMap<String, RollingWindow>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            limits: HashMap::new(),
        }
    }

    pub fn with_limit(mut self, key: &str, max: u32, window: Duration) -> Result<Self, RateLimitError> {
        self.limits.insert(key.to_string(), RollingWindow::new(max, window)?);
        Ok(self)
    }

    /// Wait for a slot on `key`
    pub async fn acquire(&self, key: &str) {
        if let Some(window) = self.limits.get(key) {
            window.acquire().await;
        }
    }

    /// Wait until `key` has a free slot, without taking it
    pub async fn wait_available(&self, key: &str) {
        if let Some(window) = self.limits.get(key) {
            window.wait_available().await;
        }
    }

    /// Take a slot without waiting
    pub fn check(&self, key: &str) -> Result<(), RateLimitError> {
        if self.try_acquire(key) {
            Ok(())
        } else {
            Err(RateLimitError::LimitExceeded(key.to_string()))
        }
    }

    pub fn try_acquire(&self, key: &str) -> bool {
        match self.limits.get(key) {
            Some(window) => window.try_acquire(),
            None => true,
        }
    }

    pub fn remaining(&self, key: &str) -> u32 {
        match self.limits.get(key) {
            Some(window) => window.remaining(),
            None => u32::MAX,
        }
    }
}
