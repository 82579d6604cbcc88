pub mod event;
pub mod order;
pub mod quote;

pub use event::*;
pub use order::*;
pub use quote::*;

/// Current Unix time in milliseconds
pub fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
