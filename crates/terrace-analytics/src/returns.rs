//! Return and volatility engine: log-returns, rolling volatility and
//! pairwise correlation over region price columns.

use crate::error::Result;
use crate::frame::{DATE_COLUMN, column_values, date_strings, region_columns};
use ndarray::Array2;
use polars::prelude::*;

/// Default trailing window for rolling volatility, in months.
pub const DEFAULT_VOLATILITY_WINDOW: usize = 12;

/// Element-wise log difference between consecutive dates, per region.
///
/// The first row is null by construction (no prior period), and any null or
/// non-positive price on either side of a difference propagates as null.
pub fn log_returns(table: &DataFrame) -> Result<DataFrame> {
    let regions = region_columns(table);
    if regions.is_empty() {
        return Ok(table.clone());
    }
    let dates = date_strings(table)?;

    let mut columns: Vec<Column> = Vec::with_capacity(regions.len() + 1);
    columns.push(Series::new(DATE_COLUMN.into(), dates).into());

    for region in &regions {
        let values = column_values(table, region)?;
        let mut diffs: Vec<Option<f64>> = Vec::with_capacity(values.len());
        for row in 0..values.len() {
            let diff = if row == 0 {
                None
            } else {
                match (values[row - 1], values[row]) {
                    (Some(prev), Some(cur)) if prev > 0.0 && cur > 0.0 => {
                        Some(cur.ln() - prev.ln())
                    }
                    _ => None,
                }
            };
            diffs.push(diff);
        }
        columns.push(Series::new(region.as_str().into(), diffs).into());
    }

    Ok(DataFrame::new(columns)?)
}

/// Rolling sample standard deviation over a trailing window, per region.
///
/// Null until `window` observations of history exist within the window.
pub fn rolling_volatility(returns: &DataFrame, window: usize) -> Result<DataFrame> {
    let regions = region_columns(returns);
    if regions.is_empty() {
        return Ok(returns.clone());
    }

    let exprs: Vec<Expr> = regions
        .iter()
        .map(|region| {
            col(region.as_str())
                .rolling_std(RollingOptionsFixedWindow {
                    window_size: window,
                    min_periods: window,
                    ..Default::default()
                })
                .alias(region.as_str())
        })
        .collect();

    Ok(returns.clone().lazy().with_columns(exprs).collect()?)
}

/// Pairwise Pearson correlation between region columns.
///
/// Symmetric with a unit diagonal for any region with non-zero variance;
/// entries where the overlap is shorter than two periods or either side has
/// zero variance come out as NaN.
#[derive(Debug, Clone)]
pub struct Correlation {
    /// Region labels, one per matrix axis.
    pub regions: Vec<String>,
    /// Correlation coefficients, `matrix[[i, j]]` for `regions[i]` vs `regions[j]`.
    pub matrix: Array2<f64>,
}

impl Correlation {
    /// Flatten to a presentation-ready frame: a `region` label column plus
    /// one column per region.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.regions.len() + 1);
        columns.push(Series::new("region".into(), self.regions.clone()).into());
        for (j, region) in self.regions.iter().enumerate() {
            let values: Vec<f64> = (0..self.regions.len())
                .map(|i| self.matrix[[i, j]])
                .collect();
            columns.push(Series::new(region.as_str().into(), values).into());
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Compute the pairwise correlation matrix of a returns table.
///
/// Each pair is computed over the dates where both regions have a value, so
/// partial coverage narrows the overlap instead of biasing the estimate.
pub fn correlation(returns: &DataFrame) -> Result<Correlation> {
    let regions = region_columns(returns);
    let columns: Vec<Vec<Option<f64>>> = regions
        .iter()
        .map(|region| column_values(returns, region))
        .collect::<Result<_>>()?;

    let n = regions.len();
    let mut matrix = Array2::from_elem((n, n), f64::NAN);
    for i in 0..n {
        for j in i..n {
            let r = pairwise_pearson(&columns[i], &columns[j]);
            matrix[[i, j]] = r;
            matrix[[j, i]] = r;
        }
    }

    Ok(Correlation { regions, matrix })
}

/// Pearson correlation over the rows where both series are non-null.
fn pairwise_pearson(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b.iter())
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    let n = pairs.len();
    if n < 2 {
        return f64::NAN;
    }

    let nf = n as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / nf;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / nf;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::fixtures::series_table;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    #[test]
    fn test_log_returns_constant_growth() {
        let table = series_table(
            &["2020-01-01", "2020-02-01", "2020-03-01"],
            &[("A", &[Some(100.0), Some(110.0), Some(121.0)])],
        );
        let returns = log_returns(&table).unwrap();
        let a = returns.column("A").unwrap().f64().unwrap();

        assert!(a.get(0).is_none());
        assert_abs_diff_eq!(a.get(1).unwrap(), 1.1_f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(a.get(2).unwrap(), 1.1_f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(a.get(1).unwrap(), 0.0953, epsilon = 1e-4);
    }

    #[test]
    fn test_log_returns_null_propagation() {
        let table = series_table(
            &["2020-01-01", "2020-02-01", "2020-03-01"],
            &[("B", &[Some(200.0), None, Some(242.0)])],
        );
        let returns = log_returns(&table).unwrap();
        let b = returns.column("B").unwrap().f64().unwrap();

        // A null breaks both differences that touch it.
        assert!(b.get(0).is_none());
        assert!(b.get(1).is_none());
        assert!(b.get(2).is_none());
    }

    #[test]
    fn test_rolling_volatility_needs_full_window() {
        let dates: Vec<String> = (1..=5).map(|m| format!("2020-{m:02}-01")).collect();
        let date_refs: Vec<&str> = dates.iter().map(String::as_str).collect();
        let table = series_table(
            &date_refs,
            &[("A", &[Some(0.1), Some(0.2), Some(0.1), Some(0.2), Some(0.1)])],
        );

        let vol = rolling_volatility(&table, 3).unwrap();
        let a = vol.column("A").unwrap().f64().unwrap();

        assert!(a.get(0).is_none());
        assert!(a.get(1).is_none());
        // Sample std of [0.1, 0.2, 0.1].
        assert_abs_diff_eq!(a.get(2).unwrap(), 0.057735, epsilon = 1e-5);
    }

    #[test]
    fn test_correlation_symmetric_unit_diagonal() {
        let table = series_table(
            &["2020-01-01", "2020-02-01", "2020-03-01", "2020-04-01"],
            &[
                ("A", &[Some(0.1), Some(-0.2), Some(0.3), Some(0.0)]),
                ("B", &[Some(0.2), Some(-0.1), Some(0.25), Some(0.05)]),
            ],
        );
        let corr = correlation(&table).unwrap();

        assert_abs_diff_eq!(corr.matrix[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(corr.matrix[[1, 1]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(corr.matrix[[0, 1]], corr.matrix[[1, 0]], epsilon = 1e-12);
        assert!(corr.matrix[[0, 1]] <= 1.0 && corr.matrix[[0, 1]] >= -1.0);
    }

    #[test]
    fn test_correlation_perfectly_anticorrelated() {
        let table = series_table(
            &["2020-01-01", "2020-02-01", "2020-03-01"],
            &[
                ("A", &[Some(1.0), Some(2.0), Some(3.0)]),
                ("B", &[Some(3.0), Some(2.0), Some(1.0)]),
            ],
        );
        let corr = correlation(&table).unwrap();
        assert_abs_diff_eq!(corr.matrix[[0, 1]], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_correlation_overlap_only() {
        // B has a hole; the pair estimate uses the three overlapping rows.
        let table = series_table(
            &["2020-01-01", "2020-02-01", "2020-03-01", "2020-04-01"],
            &[
                ("A", &[Some(1.0), Some(2.0), Some(3.0), Some(4.0)]),
                ("B", &[Some(2.0), None, Some(6.0), Some(8.0)]),
            ],
        );
        let corr = correlation(&table).unwrap();
        assert_abs_diff_eq!(corr.matrix[[0, 1]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_correlation_zero_variance_is_nan() {
        let table = series_table(
            &["2020-01-01", "2020-02-01", "2020-03-01"],
            &[
                ("A", &[Some(1.0), Some(2.0), Some(3.0)]),
                ("Flat", &[Some(5.0), Some(5.0), Some(5.0)]),
            ],
        );
        let corr = correlation(&table).unwrap();
        assert!(corr.matrix[[0, 1]].is_nan());
        assert!(corr.matrix[[1, 1]].is_nan());
    }

    #[rstest]
    #[case(&[Some(1.0), Some(2.0), Some(3.0)], &[Some(2.0), Some(4.0), Some(6.0)], 1.0)]
    #[case(&[Some(1.0), Some(2.0), Some(3.0)], &[Some(3.0), Some(2.0), Some(1.0)], -1.0)]
    #[case(&[Some(1.0), None, Some(3.0), Some(4.0)], &[Some(2.0), Some(9.9), Some(6.0), Some(8.0)], 1.0)]
    fn test_pairwise_pearson_exact(
        #[case] a: &[Option<f64>],
        #[case] b: &[Option<f64>],
        #[case] expected: f64,
    ) {
        assert_abs_diff_eq!(pairwise_pearson(a, b), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_correlation_frame_shape() {
        let table = series_table(
            &["2020-01-01", "2020-02-01", "2020-03-01"],
            &[
                ("A", &[Some(1.0), Some(2.0), Some(3.0)]),
                ("B", &[Some(3.0), Some(2.0), Some(1.0)]),
            ],
        );
        let frame = correlation(&table).unwrap().to_frame().unwrap();
        assert_eq!(frame.get_column_names_str(), vec!["region", "A", "B"]);
        assert_eq!(frame.height(), 2);
    }
}
