//! Spatial snapshot builder: a single month's prices joined to geometry.
//!
//! The join contract is explicit and typed: snapshot rows and boundaries
//! meet on the ONS area code only. Geometry is authoritative for shape (a
//! row without a boundary is dropped), the snapshot is authoritative for
//! value (a boundary without data renders as a null-valued "no data" area).

use crate::boundaries::BoundaryStore;
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Placeholder shown for areas with no published price.
const NO_DATA_PLACEHOLDER: &str = "N/A";

/// One map row: an area known to the geometry source, with its value for
/// the selected month if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    /// ONS area code.
    pub area_code: String,
    /// Price for the month; `None` where the area has no data.
    pub value: Option<f64>,
    /// Display label: region name from the data, else the boundary name,
    /// else the bare area code.
    pub label: String,
    /// Value with thousands separators, or the no-data placeholder.
    pub formatted_value: String,
}

/// A snapshot joined onto geometry, ready to serialize as GeoJSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoSnapshot {
    /// Always `"FeatureCollection"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// One feature per area with both geometry and a snapshot row.
    pub features: Vec<GeoFeature>,
}

/// One feature of a [`GeoSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoFeature {
    /// Always `"Feature"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display and styling properties for the map layer.
    pub properties: GeoProperties,
    /// GeoJSON Polygon or MultiPolygon in WGS84.
    pub geometry: Value,
}

/// Properties carried by each [`GeoFeature`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoProperties {
    /// ONS area code.
    pub area_code: String,
    /// Display label.
    pub label: String,
    /// Price value, `null` where the area has no data.
    pub value: Option<f64>,
    /// Formatted price, or the no-data placeholder.
    pub formatted_value: String,
}

/// Build the per-area snapshot for one month.
///
/// `monthly` is the store's cross-section frame (`area_code`,
/// `region_name`, `price`). Every area code known to the geometry source
/// produces exactly one row; data rows for unknown area codes do not
/// appear here (they resurface, and are dropped, in the geometry join).
pub fn snapshot(monthly: &DataFrame, boundaries: &BoundaryStore) -> Result<Vec<SnapshotRow>> {
    let mut by_code: BTreeMap<String, (Option<String>, Option<f64>)> = BTreeMap::new();
    if monthly.height() > 0 {
        let codes = monthly.column("area_code")?.str()?;
        let names = monthly.column("region_name")?.str()?;
        let prices = monthly.column("price")?.f64()?;
        for i in 0..monthly.height() {
            if let Some(code) = codes.get(i) {
                by_code.insert(
                    code.to_string(),
                    (names.get(i).map(str::to_string), prices.get(i)),
                );
            }
        }
    }

    let rows = boundaries
        .area_codes()
        .into_iter()
        .map(|area_code| {
            let (data_name, value) = by_code
                .get(&area_code)
                .cloned()
                .unwrap_or((None, None));
            let boundary_name = boundaries
                .get(&area_code)
                .and_then(|b| b.name.clone());
            let label = data_name
                .or(boundary_name)
                .unwrap_or_else(|| area_code.clone());
            let formatted_value = value
                .map(format_thousands)
                .unwrap_or_else(|| NO_DATA_PLACEHOLDER.to_string());
            SnapshotRow {
                area_code,
                value,
                label,
                formatted_value,
            }
        })
        .collect();

    Ok(rows)
}

/// Join snapshot rows onto their boundary geometry.
///
/// Rows without a matching boundary are dropped; there is nothing to draw
/// for them.
pub fn join_to_geometry(rows: &[SnapshotRow], boundaries: &BoundaryStore) -> GeoSnapshot {
    let features = rows
        .iter()
        .filter_map(|row| {
            let boundary = boundaries.get(&row.area_code)?;
            Some(GeoFeature {
                kind: "Feature".to_string(),
                properties: GeoProperties {
                    area_code: row.area_code.clone(),
                    label: row.label.clone(),
                    value: row.value,
                    formatted_value: row.formatted_value.clone(),
                },
                geometry: boundary.geometry.clone(),
            })
        })
        .collect();

    GeoSnapshot {
        kind: "FeatureCollection".to_string(),
        features,
    }
}

/// Format a price with thousands separators, rounding to whole units.
fn format_thousands(value: f64) -> String {
    let rounded = value.round();
    let negative = rounded < 0.0;
    let digits = format!("{}", rounded.abs() as u64);

    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if negative {
        format!("-{out}")
    } else {
        out
    }
}
