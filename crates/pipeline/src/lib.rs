//! Order execution pipeline
//!
//! Drives one order through `pending → routing → building → submitted →
//! confirmed`, persisting each transition before publishing it. Failures are
//! written to the order and classified as retryable or fatal for the queue.

pub mod builder;
pub mod error;
pub mod executor;

pub use builder::{BuildError, DefaultRequestBuilder, RequestBuilder};
pub use error::{classify, PipelineError};
pub use executor::{JobExecutor, PipelineExecutor};
