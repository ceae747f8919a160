//! Least squares solver for the built-in regression forecaster.
//!
//! Each ARX fit is a small problem:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! with an intercept plus a few lagged predictor columns. SVD handles the tall,
//! occasionally collinear design matrices (7-day averaged signals are smooth,
//! so neighbouring lags are nearly proportional).

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit `rows` (each already including the intercept column) against `targets`.
///
/// Returns the coefficients and the in-sample residuals.
pub fn fit_linear(rows: &[Vec<f64>], targets: &[f64]) -> Option<(Vec<f64>, Vec<f64>)> {
    let n = rows.len();
    let k = rows.first()?.len();
    if n == 0 || n != targets.len() || rows.iter().any(|r| r.len() != k) {
        return None;
    }
    let x = DMatrix::from_fn(n, k, |i, j| rows[i][j]);
    let y = DVector::from_column_slice(targets);
    let beta = solve_least_squares(&x, &y)?;
    let residuals = (&y - &x * &beta).iter().copied().collect();
    Some((beta.iter().copied().collect(), residuals))
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn fit_linear_returns_residuals() {
        let rows = vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![1.0, 2.0], vec![1.0, 3.0]];
        let targets = [1.0, 2.0, 2.0, 3.0];
        let (beta, residuals) = fit_linear(&rows, &targets).unwrap();
        // OLS: slope 0.6, intercept 1.1.
        assert!((beta[0] - 1.1).abs() < 1e-10);
        assert!((beta[1] - 0.6).abs() < 1e-10);
        assert!(residuals.iter().sum::<f64>().abs() < 1e-10);
        assert!((dot(&beta, &rows[2]) - 2.3).abs() < 1e-10);
    }
}
