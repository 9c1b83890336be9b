//! Error types for the transformation engines.
//!
//! Only genuine contract violations are errors. Empty selections, unknown
//! regions and missing coverage are represented as values by the individual
//! engines, so callers can render informational states instead of failing.

use thiserror::Error;

/// Result type for the transformation engines.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Errors that can occur during a transformation.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Requested more components than the data can support
    #[error("Requested {requested} components, but the input supports at most {max}")]
    ComponentCount {
        /// Number of components requested
        requested: usize,
        /// Maximum supported by the input dimensions
        max: usize,
    },

    /// Requested more clusters than there are observations
    #[error("Requested {requested} clusters, but only {max} observations are available")]
    ClusterCount {
        /// Number of clusters requested
        requested: usize,
        /// Number of complete observations
        max: usize,
    },

    /// Insufficient data for estimation
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// The whole-market aggregate column is absent or entirely null
    #[error("Aggregate series '{0}' is missing or has no observations")]
    AggregateMissing(String),

    /// A date value in the table could not be interpreted
    #[error("Invalid date in series table: {0}")]
    InvalidDate(String),
}
