//! Core configuration structures for the order execution engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server and observability
    pub server: ServerConfig,

    /// Order and job persistence
    pub database: DatabaseConfig,

    /// Job queue and worker pool
    pub queue: QueueConfig,

    /// Quote sources and routing
    pub router: RouterConfig,

    /// Subscriber channels
    pub notifications: NotificationConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// HTTP port for intake and WebSocket subscriptions
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Emit logs as JSON
    pub log_json: bool,

    /// Enable the Prometheus endpoint
    pub metrics_enabled: bool,

    /// Metrics server port
    pub metrics_port: u16,
}

/// Persistence configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file, created if missing
    pub path: String,

    /// Keep everything in memory; nothing survives a restart
    pub in_memory: bool,
}

/// Queue and worker pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Concurrent workers
    pub concurrency: usize,

    /// Job starts admitted per rate window
    pub rate_limit: u32,

    pub rate_window_ms: u64,

    /// Attempts per job, including the first
    pub max_attempts: u32,

    /// First retry delay; doubles on each further attempt
    pub backoff_ms: u64,

    /// Optional ceiling on the retry delay
    pub max_backoff_ms: Option<u64>,

    pub keep_completed: usize,
    pub keep_failed: usize,

    /// Lease lifetime before a job is considered abandoned
    pub visibility_timeout_ms: u64,

    pub poll_interval_ms: u64,
    pub reaper_interval_ms: u64,

    /// How long shutdown waits for running jobs
    pub shutdown_timeout_ms: u64,
}

/// Routing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Venue ids in priority order
    pub venues: Vec<String>,

    /// Per-source quote timeout
    pub quote_timeout_ms: u64,

    /// Tolerated shortfall below the quoted output, in basis points
    pub slippage_tolerance_bps: u32,

    /// Simulated settlement delay band
    pub mock_delay_min_ms: u64,
    pub mock_delay_max_ms: u64,
}

/// Subscriber channel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Events buffered per subscriber before new ones are dropped
    pub channel_capacity: usize,
}

/// Venues the engine knows how to build
pub const KNOWN_VENUES: [&str; 2] = ["raydium", "meteora"];

impl QueueConfig {
    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn max_backoff(&self) -> Option<Duration> {
        self.max_backoff_ms.map(Duration::from_millis)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_millis(self.visibility_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl RouterConfig {
    pub fn quote_timeout(&self) -> Duration {
        Duration::from_millis(self.quote_timeout_ms)
    }

    pub fn mock_delay(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.mock_delay_min_ms),
            Duration::from_millis(self.mock_delay_max_ms),
        )
    }
}

// Default value functions
fn default_venues() -> Vec<String> {
    KNOWN_VENUES.iter().map(|v| v.to_string()).collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_json: false,
            metrics_enabled: true,
            metrics_port: 9090,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "order-engine.db".to_string(),
            in_memory: false,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            rate_limit: 100,
            rate_window_ms: 60_000,
            max_attempts: 3,
            backoff_ms: 2_000,
            max_backoff_ms: None,
            keep_completed: 100,
            keep_failed: 50,
            visibility_timeout_ms: 30_000,
            poll_interval_ms: 250,
            reaper_interval_ms: 5_000,
            shutdown_timeout_ms: 30_000,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            venues: default_venues(),
            quote_timeout_ms: 5_000,
            slippage_tolerance_bps: 100, // 1%
            mock_delay_min_ms: 2_000,
            mock_delay_max_ms: 3_000,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { channel_capacity: 64 }
    }
}
