//! Data collaborator boundary.

pub mod source;

pub use source::{validate_bars, DataError, MarketDataSource};
