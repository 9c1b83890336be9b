//! Explicitly constructed application context.
//!
//! One `AppContext` owns everything with process-lifetime state: the SQLite
//! store, the boundary geometry (loaded on first access or by an explicit
//! warm-up), and the memoization cache. Nothing here is a global; teardown
//! is an ordinary drop at process exit.

use crate::config::AppConfig;
use crate::memo::MemoCache;
use polars::prelude::DataFrame;
use std::sync::{Arc, Mutex};
use terrace_analytics::AnalyticsError;
use terrace_data::{DataError, HpiStore};
use terrace_geo::{BoundaryStore, GeoError};
use thiserror::Error;

/// Errors surfaced by context construction and memoized queries.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Storage-layer error
    #[error(transparent)]
    Data(#[from] DataError),

    /// Geometry error; fatal for spatial views
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// Transformation-engine error
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}

/// Application context: store, boundaries, memo cache, configuration.
#[derive(Debug)]
pub struct AppContext {
    config: AppConfig,
    store: HpiStore,
    memo: MemoCache,
    boundaries: Mutex<Option<Arc<BoundaryStore>>>,
}

impl AppContext {
    /// Open the store and build a context. Boundaries stay cold until
    /// first use; call [`Self::warm_up`] to fail fast instead.
    pub fn new(config: AppConfig) -> Result<Self, ContextError> {
        let store = HpiStore::open(&config.db_path, config.store.clone())?;
        let memo = MemoCache::new(config.memo_ttl, config.memo_capacity);
        Ok(Self {
            config,
            store,
            memo,
            boundaries: Mutex::new(None),
        })
    }

    /// The active configuration.
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The underlying store.
    pub const fn store(&self) -> &HpiStore {
        &self.store
    }

    /// The memoization cache.
    pub const fn memo(&self) -> &MemoCache {
        &self.memo
    }

    /// Boundary geometry, fetched and cached to disk on the first call.
    ///
    /// A failure here is fatal to every spatial feature and is returned
    /// as-is rather than degraded to an empty map.
    pub fn boundaries(&self) -> Result<Arc<BoundaryStore>, ContextError> {
        let mut slot = self
            .boundaries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(boundaries) = slot.as_ref() {
            return Ok(boundaries.clone());
        }
        let loaded = Arc::new(BoundaryStore::load(&self.config.geometry_cache_path)?);
        *slot = Some(loaded.clone());
        Ok(loaded)
    }

    /// Eagerly load everything with external I/O, so startup fails fast
    /// when the geometry source is unreachable on a cold cache.
    pub fn warm_up(&self) -> Result<(), ContextError> {
        self.boundaries()?;
        Ok(())
    }

    /// Memoized pivoted price table for a region selection.
    pub fn region_series(
        &self,
        regions: &[String],
        include_aggregate: bool,
    ) -> Result<Arc<DataFrame>, ContextError> {
        let fingerprint = MemoCache::fingerprint(&(regions, include_aggregate));
        self.memo.get_or_compute("region_series", fingerprint, || {
            self.store
                .region_series(regions, include_aggregate)
                .map_err(ContextError::from)
        })
    }

    /// Memoized per-area-code cross-section for one month.
    pub fn monthly_snapshot(
        &self,
        month: chrono::NaiveDate,
    ) -> Result<Arc<DataFrame>, ContextError> {
        let fingerprint = MemoCache::fingerprint(&month.format("%Y-%m").to_string());
        self.memo.get_or_compute("monthly_snapshot", fingerprint, || {
            self.store.monthly_snapshot(month).map_err(ContextError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config() -> AppConfig {
        let dir = std::env::temp_dir().join(format!(
            "terrace-ctx-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        AppConfig::with_data_dir(dir)
    }

    #[test]
    fn test_context_opens_store() {
        let context = AppContext::new(temp_config()).unwrap();
        assert!(context.store().region_names().unwrap().is_empty());
    }

    #[test]
    fn test_region_series_memoized() {
        let context = AppContext::new(temp_config()).unwrap();
        let regions = vec!["England".to_string()];

        let first = context.region_series(&regions, false).unwrap();
        let second = context.region_series(&regions, false).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(context.memo().len(), 1);
    }

    #[test]
    fn test_distinct_selections_cached_separately() {
        let context = AppContext::new(temp_config()).unwrap();
        let _ = context
            .region_series(&["England".to_string()], false)
            .unwrap();
        let _ = context
            .region_series(&["Wales".to_string()], false)
            .unwrap();
        assert_eq!(context.memo().len(), 2);
    }
}
