use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. With `json` set, events are
/// written as one JSON object per line.
pub fn init_tracing(level: &str, json: bool) -> Result<(), TracingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| TracingError::InitError(e.to_string()))?;

    let fmt_layer = if json {
        fmt::layer().with_target(true).with_level(true).json().boxed()
    } else {
        fmt::layer().with_target(true).with_level(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| TracingError::InitError(e.to_string()))?;

    Ok(())
}

/// Correlation ID for tracking one job run across components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(uuid::Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Span context for one attempt of an order job
#[derive(Debug, Clone)]
pub struct JobSpan {
    pub correlation_id: CorrelationId,
    pub order_id: String,
    pub worker_id: String,
    pub attempt: u32,
}

impl JobSpan {
    pub fn new(order_id: impl Into<String>, worker_id: impl Into<String>, attempt: u32) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            order_id: order_id.into(),
            worker_id: worker_id.into(),
            attempt,
        }
    }

    /// Tracing span for this job run
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "job",
            correlation_id = %self.correlation_id,
            order_id = %self.order_id,
            worker_id = %self.worker_id,
            attempt = self.attempt,
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("tracing initialization error: {0}")]
    InitError(String),
}
