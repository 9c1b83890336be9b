//! Shared accessors for the wide series-table layout.
//!
//! A series table is a `DataFrame` with an ascending ISO `date` column and
//! one nullable `f64` column per region.

use crate::error::{AnalyticsError, Result};
use chrono::NaiveDate;
use polars::prelude::*;

/// Name of the date key column in every series table.
pub(crate) const DATE_COLUMN: &str = "date";

/// Region column labels, in frame order (everything except the date key).
pub(crate) fn region_columns(table: &DataFrame) -> Vec<String> {
    table
        .get_column_names_str()
        .into_iter()
        .filter(|name| *name != DATE_COLUMN)
        .map(str::to_string)
        .collect()
}

/// The ISO date key column as strings.
pub(crate) fn date_strings(table: &DataFrame) -> Result<Vec<String>> {
    let dates = table.column(DATE_COLUMN)?.str()?;
    Ok(dates
        .into_iter()
        .map(|d| d.unwrap_or_default().to_string())
        .collect())
}

/// One region column as nullable values.
pub(crate) fn column_values(table: &DataFrame, region: &str) -> Result<Vec<Option<f64>>> {
    let values = table.column(region)?.f64()?;
    Ok(values.into_iter().collect())
}

/// Parse an ISO date string from the key column.
pub(crate) fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| AnalyticsError::InvalidDate(s.to_string()))
}

/// Format a date the way the key column stores it.
pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use polars::prelude::*;

    /// Build a series table from an ISO date column and named value columns.
    pub(crate) fn series_table(dates: &[&str], columns: &[(&str, &[Option<f64>])]) -> DataFrame {
        let mut cols: Vec<Column> = Vec::with_capacity(columns.len() + 1);
        let dates: Vec<String> = dates.iter().map(|d| d.to_string()).collect();
        cols.push(Series::new("date".into(), dates).into());
        for (name, values) in columns {
            cols.push(Series::new((*name).into(), values.to_vec()).into());
        }
        DataFrame::new(cols).expect("fixture frame")
    }
}
