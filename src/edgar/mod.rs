pub mod client;
pub mod filing;
pub mod parsing;
pub mod rate_limiter;
pub mod report;
pub mod tickers;
pub mod utils;

pub use client::{EdgarApi, EdgarClient};
pub use filing::FilingLocator;
pub use parsing::DocumentReducer;
pub use tickers::{RegistryCache, TickerRegistry};
