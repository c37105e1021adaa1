//! Error types for the cache

use thiserror::Error;

/// Cache operations themselves never fail; only construction can.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;
