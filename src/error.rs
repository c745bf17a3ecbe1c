//! Error types for the upstream API boundary.

use thiserror::Error;

/// Failures while fetching or decoding market-chart data.
///
/// None of these are cached: a failed fetch leaves the cache key absent so
/// the next request goes back to the network.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("malformed market-chart response: {0}")]
    Parse(String),

    #[error("upstream returned an empty price or volume series")]
    EmptySeries,
}

/// Catalog fetch failed. Non-fatal: the UI degrades to an empty coin list.
#[derive(Error, Debug)]
#[error("coin catalog unavailable: {0}")]
pub struct CatalogError(#[from] reqwest::Error);
