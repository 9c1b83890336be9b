//! Latest-value performance metrics relative to the whole-market aggregate.

use crate::error::{AnalyticsError, Result};
use crate::frame::{column_values, region_columns};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Latest observation for one region, relative to the aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionPerformance {
    /// Region label.
    pub region: String,
    /// Most recent non-null value for the region.
    pub latest_value: f64,
    /// `latest_value` divided by the aggregate's most recent non-null value.
    pub ratio_to_aggregate: f64,
}

/// Latest non-null value and aggregate-relative ratio per region.
///
/// "Latest" is per column, so regions whose series end on different months
/// each report their own last observation. The aggregate column must be
/// present and carry at least one value; that is a precondition of this
/// operation, not a renderable empty state. Selected regions with no data
/// at all are skipped silently.
pub fn latest_performance(
    table: &DataFrame,
    regions: &[String],
    aggregate_region: &str,
) -> Result<Vec<RegionPerformance>> {
    let available = region_columns(table);
    if !available.iter().any(|r| r == aggregate_region) {
        return Err(AnalyticsError::AggregateMissing(aggregate_region.to_string()));
    }

    let aggregate_latest = last_non_null(&column_values(table, aggregate_region)?)
        .ok_or_else(|| AnalyticsError::AggregateMissing(aggregate_region.to_string()))?;

    let mut performance = Vec::new();
    for region in regions {
        if !available.contains(region) {
            continue;
        }
        if let Some(latest_value) = last_non_null(&column_values(table, region)?) {
            performance.push(RegionPerformance {
                region: region.clone(),
                latest_value,
                ratio_to_aggregate: latest_value / aggregate_latest,
            });
        }
    }
    Ok(performance)
}

fn last_non_null(values: &[Option<f64>]) -> Option<f64> {
    values.iter().rev().find_map(|v| *v)
}
