use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a [`DataSource`](crate::source::DataSource).
///
/// Boundary conditions (empty source, out of range positions, zero counts)
/// are never errors; they clamp and return empty results instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("data source unavailable: {0}")]
    Unavailable(String),
    #[error("data source timed out after {0:?}")]
    Timeout(Duration),
    #[error("data source error: {0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
