//! Boundary geometry: one (multi)polygon per ONS area code.
//!
//! Boundaries come from the ONS ArcGIS feature service, requested directly
//! in WGS84 (`outSR=4326`) so no local reprojection is needed, and are
//! cached to a flat GeoJSON file. The cache has no invalidation policy;
//! local-authority boundaries change rarely enough that stale geometry is
//! accepted until the file is deleted by hand.

use crate::error::{GeoError, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// ONS feature service for Local Authority Districts (December 2024, BUC).
const BOUNDARY_SERVICE_URL: &str = "https://services1.arcgis.com/ESMARspQHYMw9BZ9/arcgis/rest/services/Local_Authority_Districts_December_2024_Boundaries_UK_BUC/FeatureServer/0/query";

/// Features requested per page. The service caps transfers, so paging is
/// required to retrieve the full district set.
const PAGE_SIZE: usize = 1000;

/// One boundary: an area code, its display name, and a GeoJSON geometry in
/// WGS84 longitude/latitude.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Boundary {
    /// ONS area code.
    pub area_code: String,
    /// District display name, when the service provides one.
    pub name: Option<String>,
    /// GeoJSON Polygon or MultiPolygon.
    pub geometry: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: String,
    properties: BTreeMap<String, Value>,
    geometry: Value,
}

/// Boundary geometry keyed by area code, read once per process lifetime.
#[derive(Debug, Clone)]
pub struct BoundaryStore {
    boundaries: BTreeMap<String, Boundary>,
}

impl BoundaryStore {
    /// Load boundaries from the cache file, fetching and caching them on a
    /// cold start. Any failure here is fatal to spatial rendering.
    pub fn load<P: AsRef<Path>>(cache_path: P) -> Result<Self> {
        let cache_path = cache_path.as_ref();
        if cache_path.exists() {
            let raw = fs::read_to_string(cache_path)?;
            let collection: FeatureCollection = serde_json::from_str(&raw)?;
            return Self::from_collection(collection);
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        let collection = fetch_boundaries(&client)?;

        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(cache_path, serde_json::to_string(&collection)?)?;

        Self::from_collection(collection)
    }

    /// Build a store from an already-parsed GeoJSON string (used by tests
    /// and by callers with their own boundary source).
    pub fn from_geojson(raw: &str) -> Result<Self> {
        let collection: FeatureCollection = serde_json::from_str(raw)?;
        Self::from_collection(collection)
    }

    fn from_collection(collection: FeatureCollection) -> Result<Self> {
        if collection.features.is_empty() {
            return Err(GeoError::EmptyBoundarySet);
        }

        let mut boundaries = BTreeMap::new();
        for feature in collection.features {
            let area_code = property_string(&feature.properties, &["area_code", "LAD24CD"])
                .ok_or_else(|| {
                    GeoError::MissingAreaCode(
                        serde_json::to_string(&feature.properties).unwrap_or_default(),
                    )
                })?;
            let name = property_string(&feature.properties, &["name", "LAD24NM"]);
            boundaries.insert(
                area_code.clone(),
                Boundary {
                    area_code,
                    name,
                    geometry: feature.geometry,
                },
            );
        }
        Ok(Self { boundaries })
    }

    /// All known area codes, sorted.
    pub fn area_codes(&self) -> Vec<String> {
        self.boundaries.keys().cloned().collect()
    }

    /// Boundary for an area code, if known.
    pub fn get(&self, area_code: &str) -> Option<&Boundary> {
        self.boundaries.get(area_code)
    }

    /// Number of boundaries.
    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    /// Whether the store holds no boundaries.
    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }
}

fn property_string(properties: &BTreeMap<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| properties.get(*key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Fetch the full district set from the feature service, page by page.
fn fetch_boundaries(client: &Client) -> Result<FeatureCollection> {
    let mut features = Vec::new();
    let mut offset = 0usize;

    loop {
        let response = client
            .get(BOUNDARY_SERVICE_URL)
            .query(&[
                ("where", "1=1"),
                ("outFields", "LAD24CD,LAD24NM"),
                ("outSR", "4326"),
                ("f", "geojson"),
                ("resultOffset", &offset.to_string()),
                ("resultRecordCount", &PAGE_SIZE.to_string()),
            ])
            .send()?
            .error_for_status()?;

        let page: FeatureCollection = response.json()?;
        let fetched = page.features.len();
        features.extend(page.features);

        if fetched < PAGE_SIZE {
            break;
        }
        offset += fetched;
    }

    if features.is_empty() {
        return Err(GeoError::EmptyBoundarySet);
    }

    Ok(FeatureCollection {
        kind: "FeatureCollection".to_string(),
        features: features
            .into_iter()
            .map(normalize_feature)
            .collect::<Result<_>>()?,
    })
}

/// Rewrite service property names to our stable keys before caching.
fn normalize_feature(feature: Feature) -> Result<Feature> {
    let area_code = property_string(&feature.properties, &["LAD24CD", "area_code"])
        .ok_or_else(|| {
            GeoError::MissingAreaCode(
                serde_json::to_string(&feature.properties).unwrap_or_default(),
            )
        })?;
    let name = property_string(&feature.properties, &["LAD24NM", "name"]);

    let mut properties = BTreeMap::new();
    properties.insert("area_code".to_string(), Value::String(area_code));
    if let Some(name) = name {
        properties.insert("name".to_string(), Value::String(name));
    }

    Ok(Feature {
        kind: feature.kind,
        properties,
        geometry: feature.geometry,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// A two-district GeoJSON fixture in the normalized cache format.
    pub(crate) const TWO_DISTRICTS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"area_code": "E06000001", "name": "Hartlepool"},
                "geometry": {"type": "Polygon", "coordinates": [[[-1.27, 54.62], [-1.16, 54.62], [-1.16, 54.72], [-1.27, 54.62]]]}
            },
            {
                "type": "Feature",
                "properties": {"area_code": "E06000002", "name": "Middlesbrough"},
                "geometry": {"type": "Polygon", "coordinates": [[[-1.29, 54.50], [-1.16, 54.50], [-1.16, 54.58], [-1.29, 54.50]]]}
            }
        ]
    }"#;
}
