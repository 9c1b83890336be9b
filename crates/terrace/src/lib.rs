#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/terrace-analytics/terrace/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod memo;

// Re-export main types from sub-crates
pub use terrace_analytics as analytics;
pub use terrace_data as data;
pub use terrace_geo as geo;

pub use config::AppConfig;
pub use context::{AppContext, ContextError};
pub use memo::MemoCache;

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
