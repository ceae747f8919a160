//! Lag application and lagged correlation search.
//!
//! Sign convention: applying lag `L` moves every timestamp of `series1` by
//! `-L` native units before the merge with `series2`:
//!
//! ```text
//! shifted_time = time - L * days_per_unit
//! ```
//!
//! After the shift, `series1(t)` sits next to `series2(t - L)`. So a negative
//! lag pairs today's `series1` with *later* `series2` values: if `series1`
//! leads `series2` by `d` days (cases today, deaths in `d` days), the
//! correlation peaks at `L = -d`.
//!
//! Every lag of a sweep is evaluated independently (shift, re-merge,
//! correlate); nothing is reused between neighbouring lags.

pub mod engine;
pub mod progress;

pub use engine::{CorrelationEngine, GroupCorrelation, NativeCorrelation};
pub use progress::{LogProgress, NoProgress, SweepControl, SweepProgress};

use std::collections::BTreeMap;

use crate::domain::{
    Correlation, CorrelationGrouping, CorrelationMethod, LagSweepResult, SignalSeries, TimeType,
    UndefinedReason,
};
use crate::error::{AppError, ErrorKind};
use crate::merge::merge;

/// Calendar days corresponding to `lag` native units.
pub fn lag_in_days(lag: i32, time_type: TimeType) -> i64 {
    i64::from(lag) * time_type.days_per_unit()
}

/// A copy of `series` with the lag applied (`shifted_time = time - lag_days`).
///
/// `None` when the shift moves a timestamp off the calendar.
pub fn apply_lag(series: &SignalSeries, lag: i32) -> Option<SignalSeries> {
    series.shifted_by_days(-lag_in_days(lag, series.time_type()))
}

/// Correlation between `series1` shifted by `lag` and `series2`.
///
/// Fails with `InputMismatch` if the two series disagree on geography or
/// granularity. Too little overlap, including a shift so large that no date
/// survives it, is reported as `Correlation::Undefined`.
pub fn correlate<E: CorrelationEngine + ?Sized>(
    engine: &E,
    series1: &SignalSeries,
    series2: &SignalSeries,
    group_by: CorrelationGrouping,
    lag: i32,
    method: CorrelationMethod,
) -> Result<Correlation, AppError> {
    let Some(shifted) = apply_lag(series1, lag) else {
        // Still reject mismatched inputs before reporting the empty overlap.
        merge(&[series1.clone(), series2.clone()])?;
        log::debug!("lag {lag}: shift leaves the calendar range");
        return Ok(Correlation::Undefined {
            n: 0,
            reason: UndefinedReason::InsufficientOverlap,
        });
    };
    let table = merge(&[shifted, series2.clone()])?;
    let groups = engine.correlate(&table, 0, 1, group_by, method)?;

    let cor = combine_groups(&groups, table.len());
    log::debug!("lag {lag}: {} aligned point(s), cor={:.4}", table.len(), cor.as_f64());
    Ok(cor)
}

/// Correlation for every lag in `[-max_lag, max_lag]`.
///
/// Reports progress through `control` and stops with `ErrorKind::Cancelled`
/// when its cancellation flag is raised between two evaluations.
pub fn sweep<E: CorrelationEngine + ?Sized>(
    engine: &E,
    series1: &SignalSeries,
    series2: &SignalSeries,
    group_by: CorrelationGrouping,
    max_lag: u32,
    method: CorrelationMethod,
    control: &mut SweepControl<'_>,
) -> Result<LagSweepResult, AppError> {
    let max = i32::try_from(max_lag)
        .map_err(|_| AppError::usage(format!("Maximum lag {max_lag} is too large.")))?;
    let total = 2 * max_lag as usize + 1;

    let mut entries = BTreeMap::new();
    let mut guard = control.start(total);
    for (index, lag) in (-max..=max).enumerate() {
        if guard.is_cancelled() {
            return Err(AppError::new(
                ErrorKind::Cancelled,
                format!("Lag sweep cancelled after {index} of {total} lags."),
            ));
        }
        let cor = correlate(engine, series1, series2, group_by, lag, method)?;
        entries.insert(lag, cor);
        guard.advance(index + 1, total);
    }

    Ok(LagSweepResult {
        time_type: series1.time_type(),
        method,
        max_lag,
        entries,
    })
}

/// Lag with the highest defined correlation.
///
/// Ties go to the smallest `|lag|`, then to the more negative lag. Fails with
/// `DegenerateCorrelation` if no lag has a defined correlation.
pub fn best_lag(result: &LagSweepResult) -> Result<(i32, f64), AppError> {
    let mut best: Option<(i32, f64)> = None;
    for (lag, cor) in result.iter() {
        let Some(value) = cor.value() else {
            continue;
        };
        let better = match best {
            None => true,
            Some((best_lag, best_value)) => {
                value > best_value
                    || (value == best_value
                        && (lag.unsigned_abs(), lag) < (best_lag.unsigned_abs(), best_lag))
            }
        };
        if better {
            best = Some((lag, value));
        }
    }
    best.ok_or_else(|| {
        AppError::degenerate(format!(
            "No lag in [-{0}, {0}] produced a defined correlation.",
            result.max_lag
        ))
    })
}

/// Reduce per-group rows to one value: the single group's value, or the mean
/// of the defined group values.
fn combine_groups(groups: &[GroupCorrelation], aligned: usize) -> Correlation {
    match groups {
        [] => Correlation::Undefined {
            n: aligned,
            reason: UndefinedReason::InsufficientOverlap,
        },
        [single] => single.cor,
        many => {
            let defined: Vec<f64> = many.iter().filter_map(|g| g.cor.value()).collect();
            if defined.is_empty() {
                // Report the most common failure reason across groups.
                let zero_var = many
                    .iter()
                    .filter(|g| {
                        matches!(
                            g.cor,
                            Correlation::Undefined {
                                reason: UndefinedReason::ZeroVariance,
                                ..
                            }
                        )
                    })
                    .count();
                let reason = if zero_var * 2 > many.len() {
                    UndefinedReason::ZeroVariance
                } else {
                    UndefinedReason::InsufficientOverlap
                };
                Correlation::Undefined { n: aligned, reason }
            } else {
                Correlation::Defined {
                    cor: defined.iter().sum::<f64>() / defined.len() as f64,
                    n: aligned,
                }
            }
        }
    }
}
