#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/terrace-analytics/terrace/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod import;
pub mod regions;
pub mod store;

pub use error::{DataError, Result};
pub use import::{ImportReport, import_csv};
pub use regions::RegionMapping;
pub use store::{AGGREGATE_REGION, HpiStore, PriceBounds, StoreConfig};

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
