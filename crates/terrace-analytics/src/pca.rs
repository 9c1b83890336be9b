//! Dimensionality-reduction engine: principal components of standardized
//! log-returns.
//!
//! Region returns are standardized (zero mean, unit variance) column-wise,
//! their covariance matrix is decomposed with a Jacobi rotation routine,
//! and the leading eigenvectors become per-region loading vectors. The sign
//! of each loading vector is arbitrary; callers should rely on relative
//! magnitude and rank only.

use crate::error::{AnalyticsError, Result};
use crate::frame::{column_values, region_columns};
use ndarray::{Array1, Array2};
use polars::prelude::*;

const JACOBI_MAX_ITERATIONS: usize = 100;
const JACOBI_TOLERANCE: f64 = 1e-12;

/// Principal-component decomposition of a returns table.
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Region labels, one per loading row.
    pub regions: Vec<String>,
    /// Loadings, `loadings[[i, k]]` is region `i`'s coefficient on
    /// component `k`. Columns are ordered by descending explained variance.
    pub loadings: Array2<f64>,
    /// Explained-variance ratio per component, non-increasing, each in
    /// `[0, 1]`, summing to at most 1.
    pub explained_variance: Vec<f64>,
}

impl Decomposition {
    /// Number of components retained.
    pub fn n_components(&self) -> usize {
        self.explained_variance.len()
    }

    /// Flatten to a presentation-ready frame: a `region` label column plus
    /// one `PC{k}` column per component.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.n_components() + 1);
        columns.push(Series::new("region".into(), self.regions.clone()).into());
        for k in 0..self.n_components() {
            let values: Vec<f64> = (0..self.regions.len())
                .map(|i| self.loadings[[i, k]])
                .collect();
            columns.push(Series::new(format!("PC{}", k + 1).into(), values).into());
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Decompose a returns table into its leading principal components.
///
/// Only rows where every region has a value enter the decomposition. The
/// component count must not exceed `min(regions, complete rows)`; asking
/// for more is an input-range error, not a truncated result. A region with
/// zero variance standardizes to an all-zero column and simply carries zero
/// weight, rather than poisoning the decomposition with a division by zero.
pub fn decompose(returns: &DataFrame, n_components: usize) -> Result<Decomposition> {
    let regions = region_columns(returns);
    let columns: Vec<Vec<Option<f64>>> = regions
        .iter()
        .map(|region| column_values(returns, region))
        .collect::<Result<_>>()?;

    let total_rows = returns.height();
    let complete: Vec<usize> = (0..total_rows)
        .filter(|&row| columns.iter().all(|column| column[row].is_some()))
        .collect();

    let n_rows = complete.len();
    let n_regions = regions.len();
    let max_components = n_regions.min(n_rows);
    if n_components == 0 || n_components > max_components {
        return Err(AnalyticsError::ComponentCount {
            requested: n_components,
            max: max_components,
        });
    }
    if n_rows < 2 {
        return Err(AnalyticsError::InsufficientData {
            required: 2,
            actual: n_rows,
        });
    }

    // Standardize column-wise over the complete rows.
    let mut data = Array2::<f64>::zeros((n_rows, n_regions));
    for (j, column) in columns.iter().enumerate() {
        let values: Vec<f64> = complete
            .iter()
            .map(|&row| column[row].unwrap_or(f64::NAN))
            .collect();
        let mean = values.iter().sum::<f64>() / n_rows as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n_rows as f64;
        let std = variance.sqrt();
        for (i, value) in values.iter().enumerate() {
            // Zero-variance column: degenerate but defined.
            data[[i, j]] = if std == 0.0 { 0.0 } else { (value - mean) / std };
        }
    }

    // Covariance of the standardized data.
    let mut cov = Array2::<f64>::zeros((n_regions, n_regions));
    for i in 0..n_regions {
        for j in i..n_regions {
            let mut sum = 0.0;
            for row in 0..n_rows {
                sum += data[[row, i]] * data[[row, j]];
            }
            let value = sum / (n_rows - 1) as f64;
            cov[[i, j]] = value;
            cov[[j, i]] = value;
        }
    }

    let (eigenvalues, eigenvectors) = jacobi_eigendecomp(&cov);

    let clamped: Vec<f64> = eigenvalues.iter().map(|&v| v.max(0.0)).collect();
    let total: f64 = clamped.iter().sum();

    let mut loadings = Array2::<f64>::zeros((n_regions, n_components));
    let mut explained_variance = Vec::with_capacity(n_components);
    for k in 0..n_components {
        for i in 0..n_regions {
            loadings[[i, k]] = eigenvectors[[i, k]];
        }
        let ratio = if total > 0.0 { clamped[k] / total } else { 0.0 };
        explained_variance.push(ratio.clamp(0.0, 1.0));
    }

    Ok(Decomposition {
        regions,
        loadings,
        explained_variance,
    })
}

/// Jacobi eigenvalue decomposition for a symmetric matrix.
///
/// Returns eigenvalues sorted descending alongside the matching
/// eigenvector columns. Stable and simple; the matrices here are one row
/// per region, so speed is irrelevant.
fn jacobi_eigendecomp(matrix: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);

    // A 1x1 matrix is already diagonal; there is no off-diagonal to rotate.
    if n > 1 {
        for _ in 0..JACOBI_MAX_ITERATIONS {
            let (p, q, max_val) = largest_off_diagonal(&a);
            if max_val.abs() < JACOBI_TOLERANCE {
                break;
            }
            let (cos, sin) = rotation(a[[p, p]], a[[q, q]], a[[p, q]]);
            apply_rotation(&mut a, &mut v, p, q, cos, sin);
        }
    }

    let mut eigenvalues = Array1::<f64>::zeros(n);
    for i in 0..n {
        eigenvalues[i] = a[[i, i]];
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        eigenvalues[j]
            .partial_cmp(&eigenvalues[i])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let sorted_eigenvalues = Array1::from_iter(order.iter().map(|&i| eigenvalues[i]));
    let mut sorted_eigenvectors = Array2::<f64>::zeros((n, n));
    for (new_idx, &old_idx) in order.iter().enumerate() {
        sorted_eigenvectors
            .column_mut(new_idx)
            .assign(&v.column(old_idx));
    }

    (sorted_eigenvalues, sorted_eigenvectors)
}

fn largest_off_diagonal(matrix: &Array2<f64>) -> (usize, usize, f64) {
    let n = matrix.nrows();
    let mut max_val = 0.0;
    let mut p = 0;
    let mut q = if n > 1 { 1 } else { 0 };

    for i in 0..n {
        for j in (i + 1)..n {
            if matrix[[i, j]].abs() > max_val {
                max_val = matrix[[i, j]].abs();
                p = i;
                q = j;
            }
        }
    }
    (p, q, matrix[[p, q]])
}

fn rotation(app: f64, aqq: f64, apq: f64) -> (f64, f64) {
    if apq.abs() < 1e-15 {
        return (1.0, 0.0);
    }
    let tau = (aqq - app) / (2.0 * apq);
    let t = if tau >= 0.0 {
        1.0 / (tau + (1.0 + tau * tau).sqrt())
    } else {
        -1.0 / (-tau + (1.0 + tau * tau).sqrt())
    };
    let cos = 1.0 / (1.0 + t * t).sqrt();
    (cos, t * cos)
}

fn apply_rotation(a: &mut Array2<f64>, v: &mut Array2<f64>, p: usize, q: usize, cos: f64, sin: f64) {
    let n = a.nrows();
    let app = a[[p, p]];
    let aqq = a[[q, q]];
    let apq = a[[p, q]];

    a[[p, p]] = cos * cos * app - 2.0 * cos * sin * apq + sin * sin * aqq;
    a[[q, q]] = sin * sin * app + 2.0 * cos * sin * apq + cos * cos * aqq;
    a[[p, q]] = 0.0;
    a[[q, p]] = 0.0;

    for i in 0..n {
        if i != p && i != q {
            let aip = a[[i, p]];
            let aiq = a[[i, q]];
            a[[i, p]] = cos * aip - sin * aiq;
            a[[p, i]] = a[[i, p]];
            a[[i, q]] = sin * aip + cos * aiq;
            a[[q, i]] = a[[i, q]];
        }
    }

    for i in 0..n {
        let vip = v[[i, p]];
        let viq = v[[i, q]];
        v[[i, p]] = cos * vip - sin * viq;
        v[[i, q]] = sin * vip + cos * viq;
    }
}
