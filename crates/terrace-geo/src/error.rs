//! Error types for geometry operations.
//!
//! Geometry failures are deliberately loud: the dashboard cannot render any
//! spatial view without boundaries, so a failed fetch surfaces as an error
//! at startup instead of degrading silently.

use thiserror::Error;

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeoError>;

/// Errors that can occur while fetching or joining boundary geometry.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Network error while fetching boundaries
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// IO error on the geometry cache file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// GeoJSON (de)serialization error
    #[error("GeoJSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// A boundary feature is missing its area code
    #[error("Boundary feature without an area code: {0}")]
    MissingAreaCode(String),

    /// The boundary service answered but returned no features
    #[error("Boundary service returned no features")]
    EmptyBoundarySet,
}
