//! Revision-aware forecast evaluation.
//!
//! One evaluation trains the same forecaster twice over the same window:
//!
//! - on the *latest* revision of every signal
//! - on the revision that was published as of `origin + horizon_days`
//!
//! and pairs both trajectories with the realized (latest) values of the
//! predicted signal over `[origin, origin + horizon_days]`. The two runs share
//! nothing: each gets its own fetch, its own table and its own engine call, and
//! a failure in one is reported next to the other's result.

pub mod engine;
pub mod models;

pub use engine::{DEFAULT_LEVEL, ForecastEngine, ForecastRequest, ForecastRow};
pub use models::BuiltinForecaster;

use chrono::{Duration, NaiveDate};

use crate::data::{SignalProvider, SignalQuery, fetch, fetch_multi};
use crate::domain::{
    DataState, ForecastPoint, ForecastResult, ForecasterKind, GeoType, Observation, SignalKey,
    SignalSeries, TimeType,
};
use crate::error::AppError;
use crate::merge::MergedTable;

/// Minimum number of history days carried for display.
const MIN_HISTORY_DAYS: i64 = 7;

/// Inputs of one forecast evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSpec {
    pub geo_type: GeoType,
    pub geo_value: String,
    pub time_type: TimeType,
    pub predictors: Vec<SignalKey>,
    pub predicted: SignalKey,
    pub forecaster: ForecasterKind,
    pub horizon_days: u32,
    pub origin_date: NaiveDate,
    pub training_start: NaiveDate,
    pub level: f64,
}

impl ForecastSpec {
    /// Predictor keys with `predicted` appended when the caller left it out.
    pub fn fetch_keys(&self) -> Vec<SignalKey> {
        let mut keys = self.predictors.clone();
        if !keys.contains(&self.predicted) {
            keys.push(self.predicted.clone());
        }
        keys
    }

    /// Revision date for the as-of run.
    ///
    /// Saturates at the end of the calendar; `evaluate` rejects such horizons.
    pub fn as_of_date(&self) -> NaiveDate {
        self.horizon_end().unwrap_or(NaiveDate::MAX)
    }

    fn horizon_end(&self) -> Option<NaiveDate> {
        self.origin_date
            .checked_add_signed(Duration::days(i64::from(self.horizon_days)))
    }

    fn history_start(&self) -> Option<NaiveDate> {
        self.origin_date
            .checked_sub_signed(Duration::days(self.history_days()))
    }

    /// Length of the history window carried with the comparison.
    pub fn history_days(&self) -> i64 {
        MIN_HISTORY_DAYS.max(3 * i64::from(self.horizon_days))
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.time_type != TimeType::Day {
            return Err(AppError::input_mismatch(format!(
                "Forecasting requires daily signals; got '{}'.",
                self.time_type
            )));
        }
        if self.horizon_days == 0 {
            return Err(AppError::usage("Forecast horizon must be at least one day."));
        }
        if self.horizon_end().is_none() || self.history_start().is_none() {
            return Err(AppError::usage(format!(
                "A {}-day horizon from {} leaves the supported date range.",
                self.horizon_days, self.origin_date
            )));
        }
        if self.training_start >= self.origin_date {
            return Err(AppError::usage(format!(
                "Training start {} must be before the forecast origin {}.",
                self.training_start, self.origin_date
            )));
        }
        Ok(())
    }
}

/// One of the two parallel runs.
#[derive(Debug, Clone)]
pub struct ForecastRun {
    pub data_state: DataState,
    pub result: Result<ForecastResult, AppError>,
    /// Predicted signal's training values over the display window; empty if
    /// the training fetch failed.
    pub history: Vec<Observation>,
}

/// Latest and as-of forecasts side by side, with the realized values.
#[derive(Debug, Clone)]
pub struct ForecastComparison {
    pub spec: ForecastSpec,
    pub latest: ForecastRun,
    pub as_of: ForecastRun,
    pub actual: SignalSeries,
}

/// Run both forecasts for `spec` and fetch the values they are judged against.
///
/// Invalid input and a failed ground-truth fetch abort the whole evaluation.
/// Training-data and forecaster failures only fail the run they belong to.
pub fn evaluate<P, E>(provider: &P, engine: &E, spec: &ForecastSpec) -> Result<ForecastComparison, AppError>
where
    P: SignalProvider + ?Sized,
    E: ForecastEngine + ?Sized,
{
    spec.validate()?;
    let keys = spec.fetch_keys();
    let query = SignalQuery::new(
        spec.geo_type,
        spec.geo_value.clone(),
        spec.training_start,
        spec.origin_date,
        spec.time_type,
    );

    let latest_table = fetch_multi(provider, &query, &keys);
    let as_of_table = fetch_multi(provider, &query.as_of(Some(spec.as_of_date())), &keys);

    let horizon = query.with_window(spec.origin_date, spec.as_of_date());
    let actual = fetch(provider, &horizon, &spec.predicted)?;

    let latest = run(engine, spec, &keys, DataState::Latest, latest_table);
    let as_of = run(engine, spec, &keys, DataState::AsOf(spec.as_of_date()), as_of_table);

    Ok(ForecastComparison {
        spec: spec.clone(),
        latest,
        as_of,
        actual,
    })
}

fn run<E: ForecastEngine + ?Sized>(
    engine: &E,
    spec: &ForecastSpec,
    keys: &[SignalKey],
    data_state: DataState,
    table: Result<MergedTable, AppError>,
) -> ForecastRun {
    let table = match table {
        Ok(table) => table,
        Err(e) => {
            log::warn!("{data_state} training data unavailable: {e}");
            return ForecastRun {
                data_state,
                result: Err(e),
                history: Vec::new(),
            };
        }
    };

    let result = forecast_one(engine, spec, keys, data_state, &table);
    if let Err(e) = &result {
        log::warn!("{data_state} forecast failed: {e}");
    }
    let history = table
        .require_column(&spec.predicted)
        .map(|idx| recent_history(&table, idx, spec))
        .unwrap_or_default();

    ForecastRun {
        data_state,
        result,
        history,
    }
}

fn forecast_one<E: ForecastEngine + ?Sized>(
    engine: &E,
    spec: &ForecastSpec,
    keys: &[SignalKey],
    data_state: DataState,
    table: &MergedTable,
) -> Result<ForecastResult, AppError> {
    let predictors = keys
        .iter()
        .map(|key| table.require_column(key))
        .collect::<Result<Vec<_>, _>>()?;
    let predicted = table.require_column(&spec.predicted)?;

    let (anchor_date, anchor_value) = table
        .last_value_at_or_before(predicted, spec.origin_date)
        .ok_or_else(|| {
            AppError::forecast(format!(
                "{data_state}: no {} value on or before {}.",
                spec.predicted, spec.origin_date
            ))
        })?;
    log::debug!("{data_state}: anchor {anchor_value:.4} from {anchor_date}");

    let request = ForecastRequest {
        table,
        predictors: &predictors,
        predicted,
        forecaster: spec.forecaster,
        horizon_days: spec.horizon_days,
        forecast_date: spec.origin_date,
        level: spec.level,
    };
    let rows = engine.forecast(&request).map_err(|e| {
        AppError::forecast(format!(
            "{data_state} {}: {}",
            spec.forecaster.display_name(),
            e.message()
        ))
    })?;
    check_rows(spec, &rows)
        .map_err(|e| AppError::forecast(format!("{data_state}: {}", e.message())))?;

    let mut points = Vec::with_capacity(rows.len() + 1);
    points.push(ForecastPoint {
        target_date: spec.origin_date,
        pred: anchor_value,
        lower: anchor_value,
        upper: anchor_value,
    });
    points.extend(rows.iter().map(|row| ForecastPoint {
        target_date: row.target_date,
        pred: row.pred,
        lower: row.pred_lower,
        upper: row.pred_upper,
    }));

    Ok(ForecastResult {
        origin: spec.origin_date,
        horizon_days: spec.horizon_days,
        data_state,
        forecaster: spec.forecaster,
        points,
    })
}

/// The engine must return exactly one finite row per horizon day, in order.
fn check_rows(spec: &ForecastSpec, rows: &[ForecastRow]) -> Result<(), AppError> {
    if rows.len() != spec.horizon_days as usize {
        return Err(AppError::forecast(format!(
            "expected {} forecast rows, got {}.",
            spec.horizon_days,
            rows.len()
        )));
    }
    for (row, day) in rows.iter().zip(1i64..) {
        let expected = spec.origin_date + Duration::days(day);
        if row.target_date != expected || row.forecast_date != spec.origin_date {
            return Err(AppError::forecast(format!(
                "row {day} targets {} from {}; expected {expected} from {}.",
                row.target_date, row.forecast_date, spec.origin_date
            )));
        }
        let finite = [row.pred, row.pred_lower, row.pred_upper].iter().all(|v| v.is_finite());
        if !finite || row.pred_lower > row.pred || row.pred > row.pred_upper {
            return Err(AppError::forecast(format!(
                "row for {} has an invalid interval ({} <= {} <= {}).",
                row.target_date, row.pred_lower, row.pred, row.pred_upper
            )));
        }
    }
    Ok(())
}

fn recent_history(table: &MergedTable, idx: usize, spec: &ForecastSpec) -> Vec<Observation> {
    let start = spec.history_start().unwrap_or(NaiveDate::MIN);
    table
        .rows()
        .iter()
        .filter(|row| row.time_value >= start && row.time_value <= spec.origin_date)
        .map(|row| Observation {
            time_value: row.time_value,
            value: row.values[idx],
        })
        .collect()
}
