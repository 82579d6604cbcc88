use std::time::Duration;

/// Exponential retry delay: `initial * multiplier^(attempt - 1)`, optionally capped.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Option<Duration>,
    multiplier: f64,
    current_attempt: u32,
}

impl ExponentialBackoff {
    /// Uncapped backoff doubling from `initial`
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            max: None,
            multiplier: 2.0,
            current_attempt: 0,
        }
    }

    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn max(&self) -> Option<Duration> {
        self.max
    }

    /// Delay before retry number `attempt` (1-based). Attempt 0 is treated as 1.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms = self.initial.as_millis() as f64 * self.multiplier.powi(exponent);
        let delay_ms = match self.max {
            Some(max) => delay_ms.min(max.as_millis() as f64),
            None => delay_ms.min(u64::MAX as f64),
        };
        Duration::from_millis(delay_ms as u64)
    }

    pub fn next_delay(&mut self) -> Duration {
        self.current_attempt += 1;
        self.delay_for_attempt(self.current_attempt)
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}
