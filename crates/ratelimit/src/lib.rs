//! Flow control for the order engine
//!
//! - `RateLimiter` / `RollingWindow`: rolling-window limit on job starts
//! - `ExponentialBackoff`: retry delay policy used by the job queue

pub mod backoff;
pub mod limiter;

pub use backoff::ExponentialBackoff;
pub use limiter::{RateLimitError, RateLimiter, RollingWindow};
