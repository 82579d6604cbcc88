use order_engine_metrics::MetricsCollector;
use order_engine_types::Quote;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::source::{QuoteError, QuoteSource};

/// A source that could not quote
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub source: String,
    pub reason: String,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.reason)
    }
}

/// Outcome of comparing every source
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    /// Best quote; its `source` is the selected route
    pub selected: Quote,

    /// Every successful quote, in configuration order
    pub quotes: Vec<Quote>,

    pub failures: Vec<SourceFailure>,
}

impl RouteDecision {
    pub fn route(&self) -> &str {
        &self.selected.source
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouteError {
    #[error("no quote source configured")]
    NoSources,

    #[error("no route: {}", format_failures(.0))]
    NoRoute(Vec<SourceFailure>),
}

fn format_failures(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Compares quotes across sources and picks the best output
pub struct QuoteRouter {
    sources: Vec<Arc<dyn QuoteSource>>,
    quote_timeout: Duration,
    metrics: MetricsCollector,
}

impl QuoteRouter {
    /// Sources are prioritised in the given order when quotes tie
    pub fn new(sources: Vec<Arc<dyn QuoteSource>>, quote_timeout: Duration) -> Self {
        Self {
            sources,
            quote_timeout,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn sources(&self) -> &[Arc<dyn QuoteSource>] {
        &self.sources
    }

    /// Settlement capability for a route
    pub fn source(&self, id: &str) -> Option<Arc<dyn QuoteSource>> {
        self.sources.iter().find(|s| s.id() == id).cloned()
    }

    /// Quote every source concurrently and select the highest estimated output
    pub async fn compare_and_route(
        &self,
        token_in: &str,
        token_out: &str,
        amount: Decimal,
    ) -> Result<RouteDecision, RouteError> {
        if self.sources.is_empty() {
            return Err(RouteError::NoSources);
        }

        debug!(token_in = %token_in, token_out = %token_out, amount = %amount, "Fetching quotes");

        let quote_futures: Vec<_> = self
            .sources
            .iter()
            .map(|source| async move {
                let started = Instant::now();
                let result = tokio::time::timeout(
                    self.quote_timeout,
                    source.get_quote(token_in, token_out, amount),
                )
                .await
                .unwrap_or(Err(QuoteError::Timeout(self.quote_timeout)));
                (source.id().to_string(), result, started.elapsed())
            })
            .collect();

        let results = futures::future::join_all(quote_futures).await;

        let mut quotes = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (source, result, latency) in results {
            match result {
                Ok(quote) => {
                    self.metrics.record_quote(&source, latency);
                    quotes.push(quote);
                }
                Err(e) => {
                    warn!(source = %source, error = %e, "Quote failed");
                    self.metrics.record_quote_failure(&source, e.kind());
                    failures.push(SourceFailure {
                        source,
                        reason: e.to_string(),
                    });
                }
            }
        }

        // strict comparison keeps the first-configured source on a tie
        let mut best: Option<&Quote> = None;
        for quote in &quotes {
            match best {
                Some(current) if quote.estimated_output <= current.estimated_output => {}
                _ => best = Some(quote),
            }
        }

        let Some(selected) = best.cloned() else {
            return Err(RouteError::NoRoute(failures));
        };

        info!(
            route = %selected.source,
            estimated_output = %selected.estimated_output,
            quotes = quotes.len(),
            failures = failures.len(),
            "Route selected"
        );
        self.metrics.record_route_selected(&selected.source);

        Ok(RouteDecision {
            selected,
            quotes,
            failures,
        })
    }

    /// Check health of all sources
    pub async fn health_check(&self) -> Vec<(String, bool)> {
        let futures: Vec<_> = self
            .sources
            .iter()
            .map(|s| async move { (s.id().to_string(), s.health_check().await) })
            .collect();

        futures::future::join_all(futures).await
    }
}
