//! Rebasing engine: index normalization against a chosen base month.
//!
//! A rebased series divides every region's column by that region's value at
//! the base month and multiplies by 100, so all selected regions meet at
//! 100 there and diverge either side. Only months where *every* selected
//! region has data qualify as a base (the coverage mask), otherwise regions
//! would be indexed against a hole.

use crate::error::Result;
use crate::frame::{
    DATE_COLUMN, column_values, date_strings, format_date, parse_date, region_columns,
};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Policy knobs for base-month selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebaseConfig {
    /// Preferred earliest base month. The default base is the first
    /// full-coverage month on or after this date, falling back to the last
    /// full-coverage month. A business policy, not a derived property.
    pub preferred_base: NaiveDate,
}

impl Default for RebaseConfig {
    fn default() -> Self {
        Self {
            preferred_base: NaiveDate::from_ymd_opt(2008, 1, 1).expect("valid literal date"),
        }
    }
}

/// Outcome of base-month candidate selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseOptions {
    /// None of the requested regions exist in the table.
    NoRegions,
    /// Regions exist, but no month has data for all of them.
    NoCoverage {
        /// Requested regions present in the table.
        present: Vec<String>,
    },
    /// Usable base months exist.
    Candidates {
        /// Requested regions present in the table.
        present: Vec<String>,
        /// Months where every present region has a value, ascending.
        valid_dates: Vec<NaiveDate>,
        /// First valid month on or after the preferred date, else the last.
        default_base: NaiveDate,
    },
}

/// Determine which months can serve as a rebase base for the given regions.
///
/// Requested regions not present as columns are dropped silently; the
/// coverage mask is the logical AND of non-null indicators across the
/// remaining columns.
pub fn select_base_candidates(
    table: &DataFrame,
    regions_of_interest: &[String],
    config: &RebaseConfig,
) -> Result<BaseOptions> {
    let available = region_columns(table);
    let mut present: Vec<String> = Vec::new();
    for region in regions_of_interest {
        if available.contains(region) && !present.contains(region) {
            present.push(region.clone());
        }
    }
    if present.is_empty() {
        return Ok(BaseOptions::NoRegions);
    }

    let dates = date_strings(table)?;
    let columns: Vec<Vec<Option<f64>>> = present
        .iter()
        .map(|region| column_values(table, region))
        .collect::<Result<_>>()?;

    let mut valid_dates = Vec::new();
    for (row, date) in dates.iter().enumerate() {
        if columns.iter().all(|column| column[row].is_some()) {
            valid_dates.push(parse_date(date)?);
        }
    }
    if valid_dates.is_empty() {
        return Ok(BaseOptions::NoCoverage { present });
    }

    let default_base = valid_dates
        .iter()
        .find(|d| **d >= config.preferred_base)
        .or_else(|| valid_dates.last())
        .copied()
        .unwrap_or(config.preferred_base);

    Ok(BaseOptions::Candidates {
        present,
        valid_dates,
        default_base,
    })
}

/// Rebase the given regions to 100 at `base_date`.
///
/// A region whose base-month value is null comes out null at every date.
/// With `include_before` false, rows before the base month are dropped.
/// An empty region selection, a missing base date, or a base month absent
/// from the table all yield an empty frame rather than an error.
pub fn rebase(
    table: &DataFrame,
    regions: &[String],
    base_date: Option<NaiveDate>,
    include_before: bool,
) -> Result<DataFrame> {
    let Some(base_date) = base_date else {
        return Ok(DataFrame::empty());
    };
    let available = region_columns(table);
    let selected: Vec<&String> = regions.iter().filter(|r| available.contains(r)).collect();
    if selected.is_empty() {
        return Ok(DataFrame::empty());
    }

    let dates = date_strings(table)?;
    let base_key = format_date(base_date);
    let Some(base_row) = dates.iter().position(|d| *d == base_key) else {
        return Ok(DataFrame::empty());
    };

    let keep: Vec<usize> = (0..dates.len())
        .filter(|&row| include_before || dates[row] >= base_key)
        .collect();

    let mut columns: Vec<Column> = Vec::with_capacity(selected.len() + 1);
    let kept_dates: Vec<String> = keep.iter().map(|&row| dates[row].clone()).collect();
    columns.push(Series::new(DATE_COLUMN.into(), kept_dates).into());

    for region in &selected {
        let values = column_values(table, region.as_str())?;
        let base_value = values[base_row];
        let rebased: Vec<Option<f64>> = keep
            .iter()
            .map(|&row| match (values[row], base_value) {
                (Some(v), Some(base)) if base != 0.0 => Some(v / base * 100.0),
                _ => None,
            })
            .collect();
        columns.push(Series::new(region.as_str().into(), rebased).into());
    }

    Ok(DataFrame::new(columns)?)
}
