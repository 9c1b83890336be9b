//! SQLite store and region time-series provider.
//!
//! Holds the `hpi_sales` table of per-month, per-region price records and
//! answers the queries the dashboard engines are built on: pivoted price
//! tables, region listings, snapshot months, axis bounds, and single-month
//! cross-sections for the map.

use crate::error::{DataError, Result};
use crate::regions::RegionMapping;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use rusqlite::{Connection, params, params_from_iter};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Column label reserved for the whole-market aggregate series.
pub const AGGREGATE_REGION: &str = "United Kingdom";

/// Configuration for the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Earliest date admitted into any query result. Records before this
    /// floor exist in the source file but predate reliable coverage.
    pub min_date: NaiveDate,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            min_date: NaiveDate::from_ymd_opt(1995, 1, 1).expect("valid literal date"),
        }
    }
}

/// One sales record as stored in the `hpi_sales` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesRecord {
    /// Observation month.
    pub date: NaiveDate,
    /// Region display name.
    pub region_name: String,
    /// ONS area code.
    pub area_code: String,
    /// Average price for the month, if published.
    pub average_price: Option<f64>,
    /// Number of sales backing the average, if published.
    pub sales_volume: Option<f64>,
}

/// Global price bounds for the map color scale, snapped to 100 000 steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBounds {
    /// Lower bound, never negative.
    pub min: i64,
    /// Upper bound.
    pub max: i64,
}

/// SQLite store for house-price sales records.
#[derive(Debug)]
pub struct HpiStore {
    conn: Connection,
    config: StoreConfig,
}

impl HpiStore {
    /// Open (or create) a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn, config };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory(config: StoreConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn, config };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Store configuration.
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS hpi_sales (
                date TEXT NOT NULL,
                region_name TEXT NOT NULL,
                area_code TEXT NOT NULL,
                average_price REAL,
                sales_volume REAL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sales_region_date ON hpi_sales(region_name, date)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sales_area_date ON hpi_sales(area_code, date)",
            [],
        )?;

        Ok(())
    }

    /// Append sales records in a single transaction.
    pub fn append_sales(&self, records: &[SalesRecord]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO hpi_sales (date, region_name, area_code, average_price, sales_volume)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.date.format("%Y-%m-%d").to_string(),
                    record.region_name,
                    record.area_code,
                    record.average_price,
                    record.sales_volume,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// All known region names, trimmed, deduplicated and sorted.
    pub fn region_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT region_name FROM hpi_sales WHERE region_name IS NOT NULL",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut names = BTreeSet::new();
        for row in rows {
            let name = row?.trim().to_string();
            if !name.is_empty() {
                names.insert(name);
            }
        }
        Ok(names.into_iter().collect())
    }

    /// Mapping between region names and area codes, deduplicated both ways.
    ///
    /// Where an area code carries more than one spelling of its name the
    /// lexicographically first one wins, matching the `MIN(region_name)`
    /// convention used by the snapshot query.
    pub fn region_mapping(&self) -> Result<RegionMapping> {
        let mut stmt = self.conn.prepare(
            "SELECT area_code, MIN(region_name)
             FROM hpi_sales
             WHERE area_code IS NOT NULL AND region_name IS NOT NULL
             GROUP BY area_code",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut pairs = Vec::new();
        for row in rows {
            pairs.push(row?);
        }
        Ok(RegionMapping::from_pairs(pairs))
    }

    /// Distinct observation months on or after the configured floor,
    /// normalized to the first of the month, sorted ascending.
    pub fn available_months(&self) -> Result<Vec<NaiveDate>> {
        let floor = self.config.min_date.format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT date FROM hpi_sales
             WHERE date IS NOT NULL AND date >= ?1
             ORDER BY date",
        )?;
        let rows = stmt.query_map(params![floor], |row| row.get::<_, String>(0))?;

        let mut months = BTreeSet::new();
        for row in rows {
            months.insert(first_of_month(parse_db_date(&row?)?));
        }
        Ok(months.into_iter().collect())
    }

    /// Observed date range, clamped to the configured floor and normalized
    /// to the first of the month.
    ///
    /// With `regions` given, the range is the intersection of the selected
    /// regions' individual ranges (latest start, earliest end). Returns
    /// `None` when the table is empty or the intersection is inverted.
    pub fn date_bounds(&self, regions: Option<&[String]>) -> Result<Option<(NaiveDate, NaiveDate)>> {
        let row: (Option<String>, Option<String>) = match regions {
            None | Some([]) => self.conn.query_row(
                "SELECT MIN(date), MAX(date) FROM hpi_sales WHERE date IS NOT NULL",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?,
            Some(regions) => {
                let placeholders = numbered_placeholders(regions.len(), 1);
                let sql = format!(
                    "SELECT MAX(x.min_d), MIN(x.max_d)
                     FROM (
                         SELECT region_name, MIN(date) AS min_d, MAX(date) AS max_d
                         FROM hpi_sales
                         WHERE date IS NOT NULL AND region_name IN ({placeholders})
                         GROUP BY region_name
                     ) x"
                );
                self.conn
                    .query_row(&sql, params_from_iter(regions.iter()), |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?
            }
        };

        let (Some(min_s), Some(max_s)) = row else {
            return Ok(None);
        };
        let min = first_of_month(parse_db_date(&min_s)?.max(self.config.min_date));
        let max = first_of_month(parse_db_date(&max_s)?);
        if min > max {
            return Ok(None);
        }
        Ok(Some((min, max)))
    }

    /// Observed price range on or after the configured floor, snapped to
    /// 100 000-unit steps for the map color scale. `None` on an empty table.
    pub fn price_bounds(&self) -> Result<Option<PriceBounds>> {
        let floor = self.config.min_date.format("%Y-%m-%d").to_string();
        let row: (Option<f64>, Option<f64>) = self.conn.query_row(
            "SELECT MIN(average_price), MAX(average_price)
             FROM hpi_sales
             WHERE average_price IS NOT NULL AND date IS NOT NULL AND date >= ?1",
            params![floor],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let (Some(min), Some(max)) = row else {
            return Ok(None);
        };
        Ok(Some(PriceBounds {
            min: snap_down_100k(min.max(0.0)),
            max: snap_up_100k(max.max(0.0)),
        }))
    }

    /// Pivoted price table for the given regions, one `f64` column per
    /// region keyed by an ascending ISO `date` column.
    ///
    /// Uses the configured date floor; see [`Self::region_series_since`]
    /// for an explicit cutoff.
    pub fn region_series(&self, regions: &[String], include_aggregate: bool) -> Result<DataFrame> {
        self.region_series_since(regions, include_aggregate, self.config.min_date)
    }

    /// Pivoted price table for the given regions with an explicit date floor.
    ///
    /// Multiple records per (date, region) collapse to the volume-weighted
    /// mean price; where the summed volume is zero or absent the unweighted
    /// mean is used instead. This fallback blends weighted and unweighted
    /// rows when only some records carry volume data, which reproduces the
    /// published series' aggregation exactly.
    ///
    /// Regions absent from the table are dropped silently. An empty
    /// selection (no regions, no aggregate) yields an empty frame.
    pub fn region_series_since(
        &self,
        regions: &[String],
        include_aggregate: bool,
        min_date: NaiveDate,
    ) -> Result<DataFrame> {
        let mut selection: Vec<String> = Vec::new();
        for region in regions {
            if !selection.contains(region) {
                selection.push(region.clone());
            }
        }
        if include_aggregate && !selection.iter().any(|r| r == AGGREGATE_REGION) {
            selection.push(AGGREGATE_REGION.to_string());
        }
        if selection.is_empty() {
            return Ok(DataFrame::empty());
        }

        let placeholders = numbered_placeholders(selection.len(), 2);
        let sql = format!(
            "SELECT
                 date,
                 region_name,
                 CASE
                     WHEN COALESCE(SUM(sales_volume), 0) = 0
                     THEN AVG(average_price)
                     ELSE SUM(average_price * sales_volume) / SUM(sales_volume)
                 END AS average_price
             FROM hpi_sales
             WHERE date >= ?1 AND region_name IN ({placeholders})
             GROUP BY date, region_name
             ORDER BY date"
        );

        let floor = min_date.format("%Y-%m-%d").to_string();
        let params: Vec<&str> = std::iter::once(floor.as_str())
            .chain(selection.iter().map(String::as_str))
            .collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<f64>>(2)?,
            ))
        })?;

        let mut cells: Vec<(String, String, Option<f64>)> = Vec::new();
        for row in rows {
            cells.push(row?);
        }
        pivot_to_wide(cells)
    }

    /// Per-area-code cross-section for a single month, volume-weighted with
    /// the same unweighted fallback as the series query.
    ///
    /// Columns: `area_code`, `region_name`, `price` (nullable).
    pub fn monthly_snapshot(&self, month: NaiveDate) -> Result<DataFrame> {
        let ym = first_of_month(month).format("%Y-%m").to_string();
        let mut stmt = self.conn.prepare(
            "SELECT
                 area_code,
                 MIN(region_name) AS region_name,
                 CASE
                     WHEN COALESCE(SUM(sales_volume), 0) = 0
                     THEN AVG(average_price)
                     ELSE SUM(average_price * sales_volume) / SUM(sales_volume)
                 END AS average_price
             FROM hpi_sales
             WHERE strftime('%Y-%m', date) = ?1
             GROUP BY area_code",
        )?;
        let rows = stmt.query_map(params![ym], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<f64>>(2)?,
            ))
        })?;

        let mut area_codes = Vec::new();
        let mut names = Vec::new();
        let mut prices = Vec::new();
        for row in rows {
            let (code, name, price) = row?;
            area_codes.push(code);
            names.push(name);
            prices.push(price);
        }

        let df = DataFrame::new(vec![
            Series::new("area_code".into(), area_codes).into(),
            Series::new("region_name".into(), names).into(),
            Series::new("price".into(), prices).into(),
        ])?;
        Ok(df)
    }
}

/// Pivot long `(date, region, price)` cells into a wide frame with one
/// column per region, dates ascending. Region columns come out in sorted
/// name order; gaps are nulls.
fn pivot_to_wide(cells: Vec<(String, String, Option<f64>)>) -> Result<DataFrame> {
    if cells.is_empty() {
        return Ok(DataFrame::empty());
    }

    let dates: BTreeSet<String> = cells.iter().map(|(d, _, _)| d.clone()).collect();
    let regions: BTreeSet<String> = cells.iter().map(|(_, r, _)| r.clone()).collect();

    let date_index: BTreeMap<&str, usize> = dates
        .iter()
        .enumerate()
        .map(|(i, d)| (d.as_str(), i))
        .collect();

    let mut grid: BTreeMap<&str, Vec<Option<f64>>> = regions
        .iter()
        .map(|r| (r.as_str(), vec![None; dates.len()]))
        .collect();

    for (date, region, price) in &cells {
        if let (Some(&row), Some(column)) =
            (date_index.get(date.as_str()), grid.get_mut(region.as_str()))
        {
            column[row] = *price;
        }
    }

    let mut columns: Vec<Column> = Vec::with_capacity(regions.len() + 1);
    let date_values: Vec<String> = dates.into_iter().collect();
    columns.push(Series::new("date".into(), date_values).into());
    for region in &regions {
        let values = grid.remove(region.as_str()).unwrap_or_default();
        columns.push(Series::new(region.as_str().into(), values).into());
    }

    Ok(DataFrame::new(columns)?)
}

fn numbered_placeholders(count: usize, start: usize) -> String {
    (0..count)
        .map(|i| format!("?{}", start + i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_db_date(s: &str) -> Result<NaiveDate> {
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").map_err(|_| DataError::InvalidDate(s.to_string()))
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn snap_up_100k(value: f64) -> i64 {
    ((value / 100_000.0).ceil() * 100_000.0) as i64
}

fn snap_down_100k(value: f64) -> i64 {
    ((value / 100_000.0).floor() * 100_000.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    fn record(
        date: &str,
        region: &str,
        code: &str,
        price: Option<f64>,
        volume: Option<f64>,
    ) -> SalesRecord {
        SalesRecord {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            region_name: region.to_string(),
            area_code: code.to_string(),
            average_price: price,
            sales_volume: volume,
        }
    }

    fn seeded_store() -> HpiStore {
        let store = HpiStore::in_memory(StoreConfig::default()).unwrap();
        store
            .append_sales(&[
                record("2020-01-01", "England", "E92000001", Some(250_000.0), Some(100.0)),
                record("2020-02-01", "England", "E92000001", Some(260_000.0), Some(120.0)),
                record("2020-01-01", "Wales", "W92000004", Some(150_000.0), Some(40.0)),
                record("2020-02-01", "Wales", "W92000004", None, None),
                record(
                    "2020-01-01",
                    AGGREGATE_REGION,
                    "K02000001",
                    Some(230_000.0),
                    Some(140.0),
                ),
                record(
                    "2020-02-01",
                    AGGREGATE_REGION,
                    "K02000001",
                    Some(240_000.0),
                    Some(150.0),
                ),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_region_names_sorted_dedup() {
        let store = seeded_store();
        let names = store.region_names().unwrap();
        assert_eq!(names, vec!["England", "United Kingdom", "Wales"]);
    }

    #[test]
    fn test_region_series_pivots_wide() {
        let store = seeded_store();
        let df = store
            .region_series(&["England".to_string(), "Wales".to_string()], false)
            .unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.get_column_names_str(), vec!["date", "England", "Wales"]);

        let wales = df.column("Wales").unwrap().f64().unwrap();
        assert_abs_diff_eq!(wales.get(0).unwrap(), 150_000.0);
        assert!(wales.get(1).is_none());
    }

    #[test]
    fn test_region_series_unknown_region_dropped() {
        let store = seeded_store();
        let df = store
            .region_series(&["England".to_string(), "Atlantis".to_string()], false)
            .unwrap();
        assert_eq!(df.get_column_names_str(), vec!["date", "England"]);
    }

    #[test]
    fn test_region_series_empty_selection() {
        let store = seeded_store();
        let df = store.region_series(&[], false).unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 0);
    }

    #[test]
    fn test_region_series_includes_aggregate() {
        let store = seeded_store();
        let df = store.region_series(&[], true).unwrap();
        assert_eq!(df.get_column_names_str(), vec!["date", AGGREGATE_REGION]);
    }

    #[test]
    fn test_volume_weighted_average_with_fallback() {
        let store = HpiStore::in_memory(StoreConfig::default()).unwrap();
        // Two records in the same month; weighted mean applies.
        store
            .append_sales(&[
                record("2021-01-01", "England", "E92000001", Some(100.0), Some(1.0)),
                record("2021-01-01", "England", "E92000001", Some(200.0), Some(3.0)),
                // Zero total volume falls back to the plain mean.
                record("2021-02-01", "England", "E92000001", Some(100.0), None),
                record("2021-02-01", "England", "E92000001", Some(300.0), None),
            ])
            .unwrap();

        let df = store.region_series(&["England".to_string()], false).unwrap();
        let prices = df.column("England").unwrap().f64().unwrap();
        assert_abs_diff_eq!(prices.get(0).unwrap(), 175.0); // (100*1 + 200*3) / 4
        assert_abs_diff_eq!(prices.get(1).unwrap(), 200.0); // (100 + 300) / 2
    }

    #[test]
    fn test_available_months_first_of_month() {
        let store = HpiStore::in_memory(StoreConfig::default()).unwrap();
        store
            .append_sales(&[
                record("2020-03-15", "England", "E92000001", Some(1.0), None),
                record("2020-03-01", "England", "E92000001", Some(1.0), None),
                record("1990-01-01", "England", "E92000001", Some(1.0), None),
            ])
            .unwrap();

        let months = store.available_months().unwrap();
        assert_eq!(months, vec![NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()]);
    }

    #[test]
    fn test_date_bounds_clamped_to_floor() {
        let store = HpiStore::in_memory(StoreConfig::default()).unwrap();
        store
            .append_sales(&[
                record("1968-04-01", "England", "E92000001", Some(1.0), None),
                record("2020-06-01", "England", "E92000001", Some(1.0), None),
            ])
            .unwrap();

        let (min, max) = store.date_bounds(None).unwrap().unwrap();
        assert_eq!(min, NaiveDate::from_ymd_opt(1995, 1, 1).unwrap());
        assert_eq!(max, NaiveDate::from_ymd_opt(2020, 6, 1).unwrap());
    }

    #[test]
    fn test_date_bounds_intersection_across_regions() {
        let store = HpiStore::in_memory(StoreConfig::default()).unwrap();
        store
            .append_sales(&[
                record("2000-01-01", "England", "E92000001", Some(1.0), None),
                record("2020-01-01", "England", "E92000001", Some(1.0), None),
                record("2010-01-01", "Wales", "W92000004", Some(1.0), None),
                record("2015-01-01", "Wales", "W92000004", Some(1.0), None),
            ])
            .unwrap();

        let (min, max) = store
            .date_bounds(Some(&["England".to_string(), "Wales".to_string()]))
            .unwrap()
            .unwrap();
        assert_eq!(min, NaiveDate::from_ymd_opt(2010, 1, 1).unwrap());
        assert_eq!(max, NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
    }

    #[test]
    fn test_date_bounds_empty_table() {
        let store = HpiStore::in_memory(StoreConfig::default()).unwrap();
        assert!(store.date_bounds(None).unwrap().is_none());
    }

    #[test]
    fn test_price_bounds_snapped() {
        let store = seeded_store();
        let bounds = store.price_bounds().unwrap().unwrap();
        assert_eq!(bounds.min, 100_000);
        assert_eq!(bounds.max, 300_000);
    }

    #[rstest]
    #[case(0.0, 0, 0)]
    #[case(1.0, 0, 100_000)]
    #[case(99_999.9, 0, 100_000)]
    #[case(100_000.0, 100_000, 100_000)]
    #[case(250_000.5, 200_000, 300_000)]
    fn test_price_snapping(#[case] value: f64, #[case] down: i64, #[case] up: i64) {
        assert_eq!(snap_down_100k(value), down);
        assert_eq!(snap_up_100k(value), up);
    }

    #[test]
    fn test_monthly_snapshot_groups_by_area_code() {
        let store = seeded_store();
        let df = store
            .monthly_snapshot(NaiveDate::from_ymd_opt(2020, 2, 15).unwrap())
            .unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(
            df.get_column_names_str(),
            vec!["area_code", "region_name", "price"]
        );
    }
}
