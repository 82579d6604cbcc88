//! Quote sources and best-price routing
//!
//! A `QuoteSource` prices a swap and settles it. `QuoteRouter` asks every
//! configured source concurrently and picks the highest estimated output.
//! `SimulatedVenue` stands in for a real DEX; `MockQuoteSource` is a
//! scripted source for tests.

pub mod mock;
pub mod router;
pub mod source;
pub mod venue;

pub use mock::MockQuoteSource;
pub use router::{QuoteRouter, RouteDecision, RouteError, SourceFailure};
pub use source::{QuoteError, QuoteSource, SwapError};
pub use venue::{SimulatedVenue, VenueConfig};
