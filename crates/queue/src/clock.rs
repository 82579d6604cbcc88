use std::time::Duration;
use tokio::time::Instant;

/// Millisecond wall clock driven by the tokio timer.
///
/// Anchored to system time once, then advanced with `tokio::time::Instant`,
/// so readiness checks follow a paused or advanced test clock.
#[derive(Debug, Clone)]
pub struct QueueClock {
    wall_origin: u64,
    origin: Instant,
}

impl QueueClock {
    pub fn new() -> Self {
        Self {
            wall_origin: order_engine_types::current_timestamp_ms(),
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.wall_origin + self.origin.elapsed().as_millis() as u64
    }

    pub fn after(&self, delay: Duration) -> u64 {
        self.now_ms().saturating_add(delay.as_millis() as u64)
    }
}

impl Default for QueueClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_clock_follows_tokio_time() {
        let clock = QueueClock::new();
        let start = clock.now_ms();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(clock.now_ms() - start, 2_000);
        assert_eq!(clock.after(Duration::from_secs(4)) - start, 6_000);
    }
}
