//! Built-in forecasters.
//!
//! All three work directly on the merged training table and produce one row
//! per day of the horizon. Rows are trained and predicted from the *anchor*:
//! the last table date at or before the forecast date. If the data lags the
//! forecast date (typical for as-of revisions), the effective ahead for target
//! `forecast_date + a` is `(forecast_date + a) - anchor`.
//!
//! - ARX: per-ahead least squares of `y(t + ahead)` on an intercept and lags
//!   0/7/14 of every predictor column.
//! - Flatline: the anchor value; residuals are the historical `ahead`-day changes.
//! - Baseline: the anchor value; residuals are one-day changes, widened by
//!   `sqrt(ahead)` like a random walk.
//!
//! Intervals come from quantiles of the symmetrized residuals at the requested
//! level. Predictions and bounds are clamped at zero.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use crate::domain::{ForecasterKind, TimeType};
use crate::error::AppError;
use crate::forecast::engine::{ForecastEngine, ForecastRequest, ForecastRow};
use crate::math::{dot, fit_linear, quantile, symmetrize};

/// Lags (days) of every predictor used as ARX features.
pub const ARX_LAGS: [i64; 3] = [0, 7, 14];

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinForecaster;

impl ForecastEngine for BuiltinForecaster {
    fn forecast(&self, request: &ForecastRequest<'_>) -> Result<Vec<ForecastRow>, AppError> {
        validate(request)?;
        let history = History::new(request);
        let anchor = history.anchor().ok_or_else(|| {
            AppError::forecast(format!(
                "No training data on or before {}.",
                request.forecast_date
            ))
        })?;
        if anchor < request.forecast_date {
            log::debug!(
                "training data ends {} day(s) before the forecast date",
                (request.forecast_date - anchor).num_days()
            );
        }

        let mut rows = Vec::with_capacity(request.horizon_days as usize);
        for day in 1..=i64::from(request.horizon_days) {
            let target_date = request.forecast_date + Duration::days(day);
            let ahead = (target_date - anchor).num_days();
            let fit = match request.forecaster {
                ForecasterKind::Arx => arx(&history, request, anchor, ahead)?,
                ForecasterKind::Flatline => flatline(&history, request.predicted, anchor, ahead)?,
                ForecasterKind::Baseline => baseline(&history, request.predicted, anchor, ahead)?,
            };
            let (lower, upper) = interval(&fit.residuals, request.level)?;
            rows.push(ForecastRow {
                target_date,
                forecast_date: request.forecast_date,
                pred: fit.pred.max(0.0),
                pred_lower: (fit.pred + lower * fit.spread).max(0.0),
                pred_upper: (fit.pred + upper * fit.spread).max(0.0),
            });
        }
        Ok(rows)
    }
}

struct Fit {
    pred: f64,
    residuals: Vec<f64>,
    /// Multiplier applied to the residual quantiles.
    spread: f64,
}

/// Table rows up to the forecast date, indexed by date.
struct History<'a> {
    request: &'a ForecastRequest<'a>,
    by_date: BTreeMap<NaiveDate, usize>,
}

impl<'a> History<'a> {
    fn new(request: &'a ForecastRequest<'a>) -> Self {
        let by_date = request
            .table
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| row.time_value <= request.forecast_date)
            .map(|(idx, row)| (row.time_value, idx))
            .collect();
        Self { request, by_date }
    }

    fn anchor(&self) -> Option<NaiveDate> {
        self.by_date.keys().next_back().copied()
    }

    fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.by_date.keys().copied()
    }

    fn value(&self, column: usize, date: NaiveDate) -> Option<f64> {
        let idx = *self.by_date.get(&date)?;
        self.request.table.rows()[idx].values.get(column).copied()
    }

    /// Intercept followed by each predictor at each ARX lag.
    fn features(&self, date: NaiveDate) -> Option<Vec<f64>> {
        let mut row = Vec::with_capacity(1 + self.request.predictors.len() * ARX_LAGS.len());
        row.push(1.0);
        for &column in self.request.predictors {
            for lag in ARX_LAGS {
                row.push(self.value(column, date - Duration::days(lag))?);
            }
        }
        Some(row)
    }
}

fn arx(history: &History<'_>, request: &ForecastRequest<'_>, anchor: NaiveDate, ahead: i64) -> Result<Fit, AppError> {
    let mut design = Vec::new();
    let mut targets = Vec::new();
    for date in history.dates() {
        let target = date + Duration::days(ahead);
        if target > anchor {
            break;
        }
        let (Some(features), Some(y)) = (history.features(date), history.value(request.predicted, target)) else {
            continue;
        };
        design.push(features);
        targets.push(y);
    }

    let width = 1 + request.predictors.len() * ARX_LAGS.len();
    if design.len() <= width {
        return Err(AppError::forecast(format!(
            "ARX needs more than {width} complete training rows for a {ahead}-day ahead; found {}.",
            design.len()
        )));
    }

    let (beta, residuals) = fit_linear(&design, &targets).ok_or_else(|| {
        AppError::forecast(format!("ARX least squares failed for a {ahead}-day ahead."))
    })?;
    let latest = history.features(anchor).ok_or_else(|| {
        AppError::forecast(format!(
            "Missing lagged predictor values at the anchor date {anchor}."
        ))
    })?;

    Ok(Fit {
        pred: dot(&beta, &latest),
        residuals,
        spread: 1.0,
    })
}

fn flatline(history: &History<'_>, predicted: usize, anchor: NaiveDate, ahead: i64) -> Result<Fit, AppError> {
    let pred = last_value(history, predicted, anchor)?;
    let residuals = changes(history, predicted, ahead);
    if residuals.is_empty() {
        return Err(AppError::forecast(format!(
            "Training window is too short for a {ahead}-day flatline interval."
        )));
    }
    Ok(Fit {
        pred,
        residuals,
        spread: 1.0,
    })
}

fn baseline(history: &History<'_>, predicted: usize, anchor: NaiveDate, ahead: i64) -> Result<Fit, AppError> {
    let pred = last_value(history, predicted, anchor)?;
    let residuals = changes(history, predicted, 1);
    if residuals.is_empty() {
        return Err(AppError::forecast(
            "Baseline needs at least two consecutive training days.",
        ));
    }
    Ok(Fit {
        pred,
        residuals,
        spread: (ahead as f64).sqrt(),
    })
}

fn last_value(history: &History<'_>, column: usize, anchor: NaiveDate) -> Result<f64, AppError> {
    history
        .value(column, anchor)
        .ok_or_else(|| AppError::forecast(format!("No value for the predicted signal at {anchor}.")))
}

/// `y(t + days) - y(t)` for every pair present in the history.
fn changes(history: &History<'_>, column: usize, days: i64) -> Vec<f64> {
    history
        .dates()
        .filter_map(|date| {
            let later = history.value(column, date + Duration::days(days))?;
            Some(later - history.value(column, date)?)
        })
        .collect()
}

/// Lower and upper residual quantiles for a central interval at `level`.
fn interval(residuals: &[f64], level: f64) -> Result<(f64, f64), AppError> {
    let sym = symmetrize(residuals);
    let lower = quantile(&sym, (1.0 - level) / 2.0);
    let upper = quantile(&sym, (1.0 + level) / 2.0);
    match (lower, upper) {
        (Some(lower), Some(upper)) => Ok((lower, upper)),
        _ => Err(AppError::forecast("Cannot derive an interval without residuals.")),
    }
}

fn validate(request: &ForecastRequest<'_>) -> Result<(), AppError> {
    if request.horizon_days == 0 {
        return Err(AppError::usage("Forecast horizon must be at least one day."));
    }
    if request
        .forecast_date
        .checked_add_signed(Duration::days(i64::from(request.horizon_days)))
        .is_none()
    {
        return Err(AppError::usage(format!(
            "A {}-day horizon from {} leaves the supported date range.",
            request.horizon_days, request.forecast_date
        )));
    }
    if !(request.level > 0.0 && request.level < 1.0) {
        return Err(AppError::usage(format!(
            "Interval level must be in (0, 1); got {}.",
            request.level
        )));
    }
    if request.table.time_type() != TimeType::Day {
        return Err(AppError::input_mismatch(
            "Forecasting requires daily signals.",
        ));
    }
    let width = request.table.columns().len();
    if request.predictors.is_empty() {
        return Err(AppError::usage("At least one predictor column is required."));
    }
    if let Some(bad) = request
        .predictors
        .iter()
        .chain(std::iter::once(&request.predicted))
        .find(|&&idx| idx >= width)
    {
        return Err(AppError::usage(format!(
            "Column {bad} is out of range for a {width}-column table."
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GeoType, Observation, SignalKey, SignalSeries};
    use crate::error::ErrorKind;
    use crate::merge::{MergedTable, merge};

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 6, 1).unwrap() + Duration::days(offset)
    }

    fn series(signal: &str, days: i64, f: impl Fn(i64) -> f64) -> SignalSeries {
        SignalSeries::new(
            GeoType::State,
            "ny",
            SignalKey::new("src", signal),
            TimeType::Day,
            (0..days)
                .map(|i| Observation {
                    time_value: day(i),
                    value: f(i),
                })
                .collect(),
        )
        .unwrap()
    }

    fn table() -> MergedTable {
        merge(&[
            series("cases", 60, |i| 50.0 + 20.0 * (i as f64 / 6.0).sin() + (i % 5) as f64),
            series("deaths", 60, |i| 5.0 + 2.0 * (i as f64 / 6.0 - 1.0).sin() + (i % 3) as f64 * 0.3),
        ])
        .unwrap()
    }

    fn request<'a>(table: &'a MergedTable, predictors: &'a [usize], forecaster: ForecasterKind) -> ForecastRequest<'a> {
        ForecastRequest {
            table,
            predictors,
            predicted: 1,
            forecaster,
            horizon_days: 7,
            forecast_date: day(59),
            level: 0.9,
        }
    }

    #[test]
    fn every_forecaster_covers_the_horizon() {
        let table = table();
        for kind in [ForecasterKind::Arx, ForecasterKind::Flatline, ForecasterKind::Baseline] {
            let rows = BuiltinForecaster.forecast(&request(&table, &[0, 1], kind)).unwrap();
            assert_eq!(rows.len(), 7, "{kind:?}");
            for (i, row) in rows.iter().enumerate() {
                assert_eq!(row.target_date, day(60 + i as i64));
                assert_eq!(row.forecast_date, day(59));
                assert!(row.pred_lower <= row.pred && row.pred <= row.pred_upper, "{kind:?} {row:?}");
                assert!(row.pred_lower >= 0.0);
            }
        }
    }

    #[test]
    fn flatline_carries_the_last_value() {
        let table = table();
        let last = table.rows().last().unwrap().values[1];
        let rows = BuiltinForecaster
            .forecast(&request(&table, &[1], ForecasterKind::Flatline))
            .unwrap();
        assert!(rows.iter().all(|r| (r.pred - last).abs() < 1e-12));
    }

    #[test]
    fn baseline_intervals_widen_with_the_ahead() {
        let table = table();
        let rows = BuiltinForecaster
            .forecast(&request(&table, &[1], ForecasterKind::Baseline))
            .unwrap();
        let widths: Vec<f64> = rows.iter().map(|r| r.pred_upper - r.pred_lower).collect();
        assert!(widths.windows(2).all(|w| w[1] >= w[0]));
        assert!(widths[6] > widths[0]);
    }

    #[test]
    fn bounds_are_clamped_at_zero() {
        let table = merge(&[series("falling", 20, |i| 100.0 - 5.0 * i as f64)]).unwrap();
        let req = ForecastRequest {
            predicted: 0,
            forecast_date: day(19),
            ..request(&table, &[0], ForecasterKind::Flatline)
        };
        let rows = BuiltinForecaster.forecast(&req).unwrap();
        assert_eq!(rows[6].pred, 5.0);
        assert_eq!(rows[6].pred_lower, 0.0);
        assert!(rows[6].pred_upper > 5.0);
    }

    #[test]
    fn lagging_data_extends_the_effective_ahead() {
        let table = table();
        let req = ForecastRequest {
            forecast_date: day(62),
            ..request(&table, &[1], ForecasterKind::Baseline)
        };
        let rows = BuiltinForecaster.forecast(&req).unwrap();
        assert_eq!(rows[0].target_date, day(63));

        let on_time = BuiltinForecaster
            .forecast(&request(&table, &[1], ForecasterKind::Baseline))
            .unwrap();
        // Target day(63) is 4 days past the anchor in both runs.
        let same_target = &on_time[3];
        assert_eq!(same_target.target_date, day(63));
        assert!((rows[0].pred_upper - same_target.pred_upper).abs() < 1e-12);
    }

    #[test]
    fn short_training_window_fails() {
        let table = merge(&[series("short", 10, |i| i as f64 + 1.0)]).unwrap();
        let req = ForecastRequest {
            predicted: 0,
            forecast_date: day(9),
            ..request(&table, &[0], ForecasterKind::Arx)
        };
        let err = BuiltinForecaster.forecast(&req).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ForecastFailure);
    }

    #[test]
    fn invalid_requests_are_rejected() {
        let table = table();
        let zero = ForecastRequest {
            horizon_days: 0,
            ..request(&table, &[1], ForecasterKind::Flatline)
        };
        assert_eq!(BuiltinForecaster.forecast(&zero).unwrap_err().kind(), ErrorKind::Usage);

        let out_of_range = request(&table, &[5], ForecasterKind::Flatline);
        assert_eq!(BuiltinForecaster.forecast(&out_of_range).unwrap_err().kind(), ErrorKind::Usage);

        let endless = ForecastRequest {
            horizon_days: u32::MAX,
            ..request(&table, &[1], ForecasterKind::Baseline)
        };
        assert_eq!(BuiltinForecaster.forecast(&endless).unwrap_err().kind(), ErrorKind::Usage);
    }
}
