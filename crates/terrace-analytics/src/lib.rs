#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/terrace-analytics/terrace/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cluster;
pub mod error;
pub mod metrics;
pub mod pca;
pub mod rebase;
pub mod returns;

pub(crate) mod frame;

pub use cluster::{ClusterAssignment, k_means};
pub use error::{AnalyticsError, Result};
pub use metrics::{RegionPerformance, latest_performance};
pub use pca::{Decomposition, decompose};
pub use rebase::{BaseOptions, RebaseConfig, rebase, select_base_candidates};
pub use returns::{Correlation, correlation, log_returns, rolling_volatility};

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
