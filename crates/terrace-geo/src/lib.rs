#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/terrace-analytics/terrace/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod boundaries;
pub mod error;
pub mod snapshot;

pub use boundaries::{Boundary, BoundaryStore};
pub use error::{GeoError, Result};
pub use snapshot::{GeoSnapshot, SnapshotRow, join_to_geometry, snapshot};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
