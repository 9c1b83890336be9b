//! Application configuration.
//!
//! Everything that the original deployment treated as a module-level
//! constant lives here instead: file locations, the date floor, and the
//! preferred rebase month.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use terrace_analytics::RebaseConfig;
use terrace_data::StoreConfig;

/// Configuration for an [`crate::AppContext`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database holding the imported HPI sales records.
    pub db_path: PathBuf,
    /// Cached boundary GeoJSON file.
    pub geometry_cache_path: PathBuf,
    /// Storage-layer policy (date floor).
    pub store: StoreConfig,
    /// Rebasing policy (preferred base month).
    pub rebase: RebaseConfig,
    /// How long memoized results stay valid.
    #[serde(with = "duration_secs")]
    pub memo_ttl: Duration,
    /// Maximum number of memoized results kept at once.
    pub memo_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::with_data_dir("data")
    }
}

impl AppConfig {
    /// Configuration with all files under the given data directory.
    pub fn with_data_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            db_path: dir.join("hpi.sqlite"),
            geometry_cache_path: dir.join("uk_boundaries.geojson"),
            store: StoreConfig::default(),
            rebase: RebaseConfig::default(),
            memo_ttl: Duration::from_secs(600),
            memo_capacity: 256,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_under_data_dir() {
        let config = AppConfig::with_data_dir("/tmp/terrace");
        assert_eq!(config.db_path, PathBuf::from("/tmp/terrace/hpi.sqlite"));
        assert_eq!(
            config.geometry_cache_path,
            PathBuf::from("/tmp/terrace/uk_boundaries.geojson")
        );
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = AppConfig::default();
        let raw = serde_json::to_string(&config).unwrap();
        let back: AppConfig = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.memo_ttl, config.memo_ttl);
        assert_eq!(back.rebase.preferred_base, config.rebase.preferred_base);
    }
}
