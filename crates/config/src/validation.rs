//! Configuration validation

use crate::{AppConfig, ConfigError, QueueConfig, Result, RouterConfig, KNOWN_VENUES};
use std::collections::HashSet;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the entire application configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut errors = Vec::new();

    // Validate server config
    if let Err(e) = validate_log_level(&config.server.log_level) {
        errors.push(e);
    }

    if config.server.port == 0 {
        errors.push(ValidationError::new("server.port", "port must be greater than 0"));
    }

    if config.server.metrics_enabled {
        if config.server.metrics_port == 0 {
            errors.push(ValidationError::new(
                "server.metrics_port",
                "metrics port must be greater than 0",
            ));
        } else if config.server.metrics_port == config.server.port {
            errors.push(ValidationError::new(
                "server.metrics_port",
                "metrics port must differ from the HTTP port",
            ));
        }
    }

    // Validate database config
    if !config.database.in_memory && config.database.path.trim().is_empty() {
        errors.push(ValidationError::new(
            "database.path",
            "database path is required unless in_memory is set",
        ));
    }

    validate_queue(&config.queue, &mut errors);
    validate_router(&config.router, &mut errors);

    // Validate notification config
    if config.notifications.channel_capacity == 0 {
        errors.push(ValidationError::new(
            "notifications.channel_capacity",
            "must be greater than 0",
        ));
    }

    // Return all errors if any were found
    if !errors.is_empty() {
        let error_msg = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::ValidationError(error_msg));
    }

    Ok(())
}

fn validate_queue(queue: &QueueConfig, errors: &mut Vec<ValidationError>) {
    let positive = [
        ("queue.concurrency", queue.concurrency as u64),
        ("queue.rate_limit", queue.rate_limit as u64),
        ("queue.rate_window_ms", queue.rate_window_ms),
        ("queue.max_attempts", queue.max_attempts as u64),
        ("queue.backoff_ms", queue.backoff_ms),
        ("queue.visibility_timeout_ms", queue.visibility_timeout_ms),
        ("queue.poll_interval_ms", queue.poll_interval_ms),
        ("queue.reaper_interval_ms", queue.reaper_interval_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if let Some(max) = queue.max_backoff_ms {
        if max < queue.backoff_ms {
            errors.push(ValidationError::new(
                "queue.max_backoff_ms",
                "must not be below backoff_ms",
            ));
        }
    }
}

fn validate_router(router: &RouterConfig, errors: &mut Vec<ValidationError>) {
    if router.venues.is_empty() {
        errors.push(ValidationError::new(
            "router.venues",
            "at least one venue must be enabled",
        ));
    }

    // Check for duplicate venue IDs
    let venue_ids: HashSet<_> = router.venues.iter().collect();
    if venue_ids.len() != router.venues.len() {
        errors.push(ValidationError::new("router.venues", "duplicate venue IDs found"));
    }

    for venue in &router.venues {
        if !KNOWN_VENUES.contains(&venue.as_str()) {
            errors.push(ValidationError::new(
                "router.venues",
                format!(
                    "unknown venue '{venue}', must be one of: {}",
                    KNOWN_VENUES.join(", ")
                ),
            ));
        }
    }

    if router.quote_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "router.quote_timeout_ms",
            "must be greater than 0",
        ));
    }

    if router.slippage_tolerance_bps >= 10000 {
        errors.push(ValidationError::new(
            "router.slippage_tolerance_bps",
            "must be < 10000 (100%)",
        ));
    }

    if router.mock_delay_min_ms > router.mock_delay_max_ms {
        errors.push(ValidationError::new(
            "router.mock_delay_min_ms",
            "must not exceed mock_delay_max_ms",
        ));
    }
}

/// Validate log level
fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new(
            "server.log_level",
            format!(
                "invalid log level '{level}', must be one of: trace, debug, info, warn, error"
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NotificationConfig, ServerConfig};

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = AppConfig {
            server: ServerConfig {
                log_level: "invalid".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_collects_every_violation() {
        let mut config = AppConfig::default();
        config.queue.concurrency = 0;
        config.queue.rate_limit = 0;
        config.router.venues = vec!["orca".to_string()];
        config.notifications = NotificationConfig { channel_capacity: 0 };

        let message = match validate_config(&config) {
            Err(ConfigError::ValidationError(message)) => message,
            other => panic!("unexpected result: {other:?}"),
        };
        assert!(message.contains("queue.concurrency"));
        assert!(message.contains("queue.rate_limit"));
        assert!(message.contains("unknown venue 'orca'"));
        assert!(message.contains("notifications.channel_capacity"));
    }

    #[test]
    fn test_validate_duplicate_venues() {
        let mut config = AppConfig::default();
        config.router.venues = vec!["raydium".to_string(), "raydium".to_string()];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_backoff_ceiling() {
        let mut config = AppConfig::default();
        config.queue.max_backoff_ms = Some(1_000);
        assert!(validate_config(&config).is_err());

        config.queue.max_backoff_ms = Some(10_000);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_mock_delay_band() {
        let mut config = AppConfig::default();
        config.router.mock_delay_min_ms = 5_000;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_in_memory_database_needs_no_path() {
        let mut config = AppConfig::default();
        config.database.path = String::new();
        assert!(validate_config(&config).is_err());

        config.database.in_memory = true;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_metrics_port_must_differ() {
        let mut config = AppConfig::default();
        config.server.metrics_port = config.server.port;
        assert!(validate_config(&config).is_err());

        config.server.metrics_enabled = false;
        assert!(validate_config(&config).is_ok());
    }
}
