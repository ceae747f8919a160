//! Sample quantiles.

use std::cmp::Ordering;

/// Linear-interpolation quantile (the common "type 7" definition).
///
/// Returns `None` for an empty sample or `p` outside `[0, 1]`.
pub fn quantile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Residuals mirrored around zero, so derived intervals are symmetric.
pub fn symmetrize(residuals: &[f64]) -> Vec<f64> {
    residuals.iter().flat_map(|&r| [r, -r]).collect()
}
