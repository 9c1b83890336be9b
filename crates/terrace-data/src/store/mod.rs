//! SQLite-backed store for house-price sales records.

pub mod sqlite;

pub use sqlite::{AGGREGATE_REGION, HpiStore, PriceBounds, SalesRecord, StoreConfig};
