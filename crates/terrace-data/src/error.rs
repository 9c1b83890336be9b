//! Error types for storage and import operations.

use thiserror::Error;

/// Result type for storage and import operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while querying or populating the price database.
#[derive(Debug, Error)]
pub enum DataError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// CSV error during bulk import
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// A date string in the database or source file could not be interpreted
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}
