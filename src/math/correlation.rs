//! Correlation coefficients over paired samples.
//!
//! - Pearson: linear correlation
//! - Spearman: Pearson on average ranks (ties share the mean rank)
//! - Kendall: tau-b, which corrects for ties on either side
//!
//! Each returns `Correlation::Undefined` instead of a number when fewer than
//! two pairs exist or one side has no variation.

use std::cmp::Ordering;

use crate::domain::{Correlation, CorrelationMethod, UndefinedReason};

/// Dispatch on `method`. `x` and `y` must have equal length.
pub fn correlation(method: CorrelationMethod, x: &[f64], y: &[f64]) -> Correlation {
    debug_assert_eq!(x.len(), y.len());
    match method {
        CorrelationMethod::Pearson => pearson(x, y),
        CorrelationMethod::Spearman => spearman(x, y),
        CorrelationMethod::Kendall => kendall(x, y),
    }
}

pub fn pearson(x: &[f64], y: &[f64]) -> Correlation {
    let n = x.len().min(y.len());
    if n < 2 {
        return insufficient(n);
    }
    let nf = n as f64;
    let mean_x = x[..n].iter().sum::<f64>() / nf;
    let mean_y = y[..n].iter().sum::<f64>() / nf;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return Correlation::Undefined {
            n,
            reason: UndefinedReason::ZeroVariance,
        };
    }
    let cor = (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0);
    Correlation::Defined { cor, n }
}

pub fn spearman(x: &[f64], y: &[f64]) -> Correlation {
    let n = x.len().min(y.len());
    if n < 2 {
        return insufficient(n);
    }
    pearson(&average_ranks(&x[..n]), &average_ranks(&y[..n]))
}

pub fn kendall(x: &[f64], y: &[f64]) -> Correlation {
    let n = x.len().min(y.len());
    if n < 2 {
        return insufficient(n);
    }

    let mut concordant_minus_discordant = 0i64;
    let (mut ties_x, mut ties_y) = (0i64, 0i64);
    for i in 0..n {
        for j in (i + 1)..n {
            let sx = sign(x[i] - x[j]);
            let sy = sign(y[i] - y[j]);
            if sx == 0 {
                ties_x += 1;
            }
            if sy == 0 {
                ties_y += 1;
            }
            concordant_minus_discordant += sx * sy;
        }
    }

    let pairs = (n * (n - 1) / 2) as i64;
    let denom = (((pairs - ties_x) as f64) * ((pairs - ties_y) as f64)).sqrt();
    if denom <= 0.0 {
        return Correlation::Undefined {
            n,
            reason: UndefinedReason::ZeroVariance,
        };
    }
    let cor = (concordant_minus_discordant as f64 / denom).clamp(-1.0, 1.0);
    Correlation::Defined { cor, n }
}

/// 1-based ranks with ties replaced by their average rank.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

fn sign(v: f64) -> i64 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

fn insufficient(n: usize) -> Correlation {
    Correlation::Undefined {
        n,
        reason: UndefinedReason::InsufficientOverlap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cor(c: Correlation) -> f64 {
        c.value().expect("defined correlation")
    }

    #[test]
    fn pearson_matches_hand_computation() {
        // x = [1,2,3,4], y = [2,4,5,4]: sxy = 3.5, sxx = 5, syy = 4.75.
        let r = cor(pearson(&[1.0, 2.0, 3.0, 4.0], &[2.0, 4.0, 5.0, 4.0]));
        let expected = 3.5 / (5.0f64.sqrt() * 4.75f64.sqrt());
        assert!((r - expected).abs() < 1e-12);
    }

    #[test]
    fn perfect_relationships() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y_lin = [3.0, 5.0, 7.0, 9.0, 11.0];
        let y_mono = [1.0, 8.0, 27.0, 64.0, 125.0];
        assert!((cor(pearson(&x, &y_lin)) - 1.0).abs() < 1e-12);
        assert!((cor(spearman(&x, &y_mono)) - 1.0).abs() < 1e-12);
        assert!((cor(kendall(&x, &y_mono)) - 1.0).abs() < 1e-12);

        let y_rev: Vec<f64> = y_mono.iter().rev().copied().collect();
        assert!((cor(kendall(&x, &y_rev)) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn kendall_tau_b_handles_ties() {
        // Pairs: (1,1) (2,2) (2,3) (3,3).
        // Six pairs; x ties once, y ties once; C - D = 4 (all untied pairs concordant).
        let r = cor(kendall(&[1.0, 2.0, 2.0, 3.0], &[1.0, 2.0, 3.0, 3.0]));
        assert!((r - 4.0 / 5.0).abs() < 1e-12);
    }

    #[test]
    fn average_ranks_share_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 10.0, 30.0]), vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn degenerate_inputs_are_undefined_not_zero() {
        assert_eq!(
            pearson(&[1.0], &[2.0]),
            Correlation::Undefined {
                n: 1,
                reason: UndefinedReason::InsufficientOverlap
            }
        );
        assert_eq!(
            pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]),
            Correlation::Undefined {
                n: 3,
                reason: UndefinedReason::ZeroVariance
            }
        );
        assert!(!kendall(&[2.0, 2.0], &[1.0, 3.0]).is_defined());
        assert!(!spearman(&[], &[]).is_defined());
    }
}
