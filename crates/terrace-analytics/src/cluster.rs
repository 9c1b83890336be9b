//! K-means clustering of regions over derived feature columns.
//!
//! A thin wrapper: rows are L2-normalized and run through Lloyd's
//! algorithm with a seeded RNG, so repeated calls with the same input
//! produce the same labels.

use crate::error::{AnalyticsError, Result};
use polars::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

const MAX_ITERATIONS: usize = 100;

/// Cluster membership for one keyed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    /// Row key (area code or region name).
    pub key: String,
    /// Zero-based cluster index.
    pub cluster: usize,
    /// Display label, `Cluster 1..=k`.
    pub label: String,
}

/// Cluster the rows of a feature frame into `k` groups.
///
/// `key_column` names the identifier column; every other column is treated
/// as an `f64` feature. Rows with any null feature are skipped silently,
/// consistent with how unknown regions are handled elsewhere. Requesting
/// more clusters than there are complete rows is an input-range error.
pub fn k_means(
    features: &DataFrame,
    key_column: &str,
    k: usize,
    seed: u64,
) -> Result<Vec<ClusterAssignment>> {
    let keys = features.column(key_column)?.str()?;
    let feature_names: Vec<String> = features
        .get_column_names_str()
        .into_iter()
        .filter(|name| *name != key_column)
        .map(str::to_string)
        .collect();

    let mut columns: Vec<Vec<Option<f64>>> = Vec::with_capacity(feature_names.len());
    for name in &feature_names {
        columns.push(features.column(name)?.f64()?.into_iter().collect());
    }

    // Gather complete rows, L2-normalized.
    let mut row_keys: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for i in 0..features.height() {
        let Some(key) = keys.get(i) else { continue };
        let values: Option<Vec<f64>> = columns.iter().map(|column| column[i]).collect();
        let Some(mut values) = values else { continue };

        let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in &mut values {
                *v /= norm;
            }
        }
        row_keys.push(key.to_string());
        rows.push(values);
    }

    if k == 0 || k > rows.len() {
        return Err(AnalyticsError::ClusterCount {
            requested: k,
            max: rows.len(),
        });
    }

    let labels = lloyd(&rows, k, seed);
    Ok(row_keys
        .into_iter()
        .zip(labels)
        .map(|(key, cluster)| ClusterAssignment {
            key,
            cluster,
            label: format!("Cluster {}", cluster + 1),
        })
        .collect())
}

fn lloyd(rows: &[Vec<f64>], k: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dims = rows.first().map_or(0, Vec::len);

    let mut centroids: Vec<Vec<f64>> = sample(&mut rng, rows.len(), k)
        .into_iter()
        .map(|i| rows[i].clone())
        .collect();
    let mut labels = vec![0usize; rows.len()];

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, row) in rows.iter().enumerate() {
            let nearest = nearest_centroid(row, &centroids);
            if labels[i] != nearest {
                labels[i] = nearest;
                changed = true;
            }
        }

        let mut sums = vec![vec![0.0; dims]; k];
        let mut counts = vec![0usize; k];
        for (row, &label) in rows.iter().zip(labels.iter()) {
            counts[label] += 1;
            for (d, v) in row.iter().enumerate() {
                sums[label][d] += v;
            }
        }
        for (cluster, count) in counts.iter().enumerate() {
            // An emptied cluster keeps its previous centroid.
            if *count > 0 {
                for d in 0..dims {
                    centroids[cluster][d] = sums[cluster][d] / *count as f64;
                }
            }
        }

        if !changed {
            break;
        }
    }
    labels
}

fn nearest_centroid(row: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (cluster, centroid) in centroids.iter().enumerate() {
        let distance: f64 = row
            .iter()
            .zip(centroid.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        if distance < best_distance {
            best_distance = distance;
            best = cluster;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature_frame() -> DataFrame {
        DataFrame::new(vec![
            Series::new(
                "area_code".into(),
                vec!["E1", "E2", "E3", "E4", "E5", "E6"],
            )
            .into(),
            Series::new(
                "x".into(),
                vec![
                    Some(1.0),
                    Some(1.1),
                    Some(0.9),
                    Some(-1.0),
                    Some(-1.2),
                    Some(-0.9),
                ],
            )
            .into(),
            Series::new(
                "y".into(),
                vec![
                    Some(1.0),
                    Some(0.9),
                    Some(1.1),
                    Some(-1.0),
                    Some(-0.8),
                    Some(-1.1),
                ],
            )
            .into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_two_obvious_clusters() {
        let assignments = k_means(&feature_frame(), "area_code", 2, 42).unwrap();
        assert_eq!(assignments.len(), 6);

        let first = assignments[0].cluster;
        // E1..E3 together, E4..E6 together, in different groups.
        assert!(assignments[1..3].iter().all(|a| a.cluster == first));
        assert!(assignments[3..].iter().all(|a| a.cluster != first));
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let a = k_means(&feature_frame(), "area_code", 2, 7).unwrap();
        let b = k_means(&feature_frame(), "area_code", 2, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_labels_are_one_based() {
        let assignments = k_means(&feature_frame(), "area_code", 2, 42).unwrap();
        for assignment in &assignments {
            assert_eq!(
                assignment.label,
                format!("Cluster {}", assignment.cluster + 1)
            );
        }
    }

    #[test]
    fn test_null_feature_rows_skipped() {
        let frame = DataFrame::new(vec![
            Series::new("area_code".into(), vec!["E1", "E2", "E3"]).into(),
            Series::new("x".into(), vec![Some(1.0), None, Some(-1.0)]).into(),
        ])
        .unwrap();

        let assignments = k_means(&frame, "area_code", 2, 1).unwrap();
        assert_eq!(assignments.len(), 2);
        assert!(assignments.iter().all(|a| a.key != "E2"));
    }

    #[test]
    fn test_too_many_clusters_rejected() {
        let err = k_means(&feature_frame(), "area_code", 9, 1).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::ClusterCount {
                requested: 9,
                max: 6
            }
        ));
    }
}
