//! Bulk import of the ONS UK-HPI full CSV file.
//!
//! The source file ships one row per (month, region) with dates formatted
//! `%d/%m/%Y` and dozens of columns we do not use. Import keeps the five
//! columns the dashboard needs, rewrites dates to ISO, and applies the two
//! area-code corrections for districts whose codes were re-issued after a
//! boundary revision.

use crate::error::{DataError, Result};
use crate::store::{HpiStore, SalesRecord};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

/// Rows inserted per transaction.
const BATCH_SIZE: usize = 50_000;

/// Area codes re-issued by ONS; source rows still carry the old code.
const AREA_CODE_CORRECTIONS: &[(&str, &str)] = &[
    ("E08000039", "E08000019"),
    ("E08000038", "E08000016"),
];

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "RegionName")]
    region_name: String,
    #[serde(rename = "AreaCode")]
    area_code: String,
    #[serde(rename = "AveragePrice")]
    average_price: Option<f64>,
    #[serde(rename = "SalesVolume")]
    sales_volume: Option<f64>,
}

/// Summary of a completed import run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportReport {
    /// Rows written to the store.
    pub rows_inserted: u64,
    /// Rows whose area code was rewritten to a current ONS code.
    pub area_codes_corrected: u64,
}

/// Import a UK-HPI full CSV file into the store.
///
/// `progress` is invoked with the running row count after each batch, so a
/// caller can drive a progress bar without this crate depending on one.
pub fn import_csv<P: AsRef<Path>>(
    store: &HpiStore,
    path: P,
    mut progress: impl FnMut(u64),
) -> Result<ImportReport> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);

    let mut report = ImportReport::default();
    let mut batch: Vec<SalesRecord> = Vec::with_capacity(BATCH_SIZE);

    for raw in reader.deserialize::<RawRecord>() {
        let raw = raw?;
        let date = NaiveDate::parse_from_str(&raw.date, "%d/%m/%Y")
            .map_err(|_| DataError::InvalidDate(raw.date.clone()))?;

        let mut area_code = raw.area_code;
        if let Some((_, corrected)) = AREA_CODE_CORRECTIONS
            .iter()
            .find(|(stale, _)| *stale == area_code)
        {
            area_code = (*corrected).to_string();
            report.area_codes_corrected += 1;
        }

        batch.push(SalesRecord {
            date,
            region_name: raw.region_name,
            area_code,
            average_price: raw.average_price,
            sales_volume: raw.sales_volume,
        });

        if batch.len() == BATCH_SIZE {
            store.append_sales(&batch)?;
            report.rows_inserted += batch.len() as u64;
            batch.clear();
            progress(report.rows_inserted);
        }
    }

    if !batch.is_empty() {
        store.append_sales(&batch)?;
        report.rows_inserted += batch.len() as u64;
        progress(report.rows_inserted);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;
    use std::io::Write;

    fn write_fixture(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("hpi.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            "Date,RegionName,AreaCode,AveragePrice,Index,SalesVolume"
        )
        .unwrap();
        writeln!(file, "01/01/2020,England,E92000001,250000,100.0,1000").unwrap();
        writeln!(file, "01/02/2020,England,E92000001,,100.0,").unwrap();
        writeln!(file, "01/01/2020,Sandwell,E08000039,180000,100.0,200").unwrap();
        path
    }

    #[test]
    fn test_import_rewrites_dates_and_codes() {
        let dir = std::env::temp_dir().join("terrace-import-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = write_fixture(&dir);

        let store = HpiStore::in_memory(StoreConfig::default()).unwrap();
        let mut last_seen = 0;
        let report = import_csv(&store, &path, |n| last_seen = n).unwrap();

        assert_eq!(report.rows_inserted, 3);
        assert_eq!(report.area_codes_corrected, 1);
        assert_eq!(last_seen, 3);

        // The stale Sandwell code is rewritten to its current form.
        let mapping = store.region_mapping().unwrap();
        assert_eq!(mapping.name_for("E08000019"), Some("Sandwell"));
        assert_eq!(mapping.name_for("E08000039"), None);

        // Nullable columns survive as nulls, not zeros.
        let df = store
            .region_series(&["England".to_string()], false)
            .unwrap();
        let prices = df.column("England").unwrap().f64().unwrap();
        assert!(prices.get(1).is_none());
    }
}
