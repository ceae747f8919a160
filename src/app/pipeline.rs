//! Shared command pipelines.
//!
//! Each pipeline turns parsed arguments into a typed request, runs the
//! fetch -> merge -> lag/forecast workflow against any `SignalProvider`, and
//! returns the computed outputs. Printing and exports stay in `app`.

use chrono::{Duration, NaiveDate};

use crate::cli::{FetchArgs, ForecastArgs, PairArgs, SelectionArgs};
use crate::data::{
    SharedWindow, SignalMetadata, SignalProvider, SignalQuery, default_max_lag, fetch, fetch_multi,
};
use crate::domain::{Correlation, LagSweepResult, SignalKey, SignalSeries, TimeType};
use crate::error::AppError;
use crate::forecast::{BuiltinForecaster, ForecastComparison, ForecastSpec, evaluate};
use crate::lag::{NativeCorrelation, SweepControl, best_lag, correlate, sweep};
use crate::merge::MergedTable;

/// Training window used when `--training-start` is omitted.
const DEFAULT_TRAINING_DAYS: i64 = 90;

/// Resolve the date window and time type for `keys`.
///
/// Explicit arguments win; anything missing comes from the metadata table
/// (the intersection of the signals' published windows).
pub fn resolve_window(
    selection: &SelectionArgs,
    keys: &[SignalKey],
    metadata: Option<&SignalMetadata>,
) -> Result<SharedWindow, AppError> {
    let window = match (selection.start, selection.end, selection.time_type) {
        (Some(start), Some(end), Some(time_type)) => SharedWindow { start, end, time_type },
        (start, end, time_type) => {
            let meta = metadata.ok_or_else(|| {
                AppError::usage("Pass --start, --end and --time-type, or --metadata to derive them.")
            })?;
            let shared = meta.shared_dates(keys, selection.geo_type)?;
            if let Some(requested) = time_type.filter(|t| *t != shared.time_type) {
                return Err(AppError::input_mismatch(format!(
                    "Requested time type '{requested}' but the signals are published as '{}'.",
                    shared.time_type
                )));
            }
            SharedWindow {
                start: start.unwrap_or(shared.start),
                end: end.unwrap_or(shared.end),
                time_type: shared.time_type,
            }
        }
    };

    if let Some(meta) = metadata {
        let shared_geo = meta.shared_geo_types(keys);
        if !shared_geo.contains(&selection.geo_type) {
            return Err(AppError::input_mismatch(format!(
                "Not every signal is published at geo_type '{}'.",
                selection.geo_type
            )));
        }
    }
    if window.start > window.end {
        return Err(AppError::usage(format!(
            "Start date {} is after end date {}.",
            window.start, window.end
        )));
    }
    log::debug!(
        "window {} .. {} ({})",
        window.start,
        window.end,
        window.time_type
    );
    Ok(window)
}

fn query_for(selection: &SelectionArgs, window: SharedWindow) -> SignalQuery {
    SignalQuery::new(
        selection.geo_type,
        selection.geo_value.clone(),
        window.start,
        window.end,
        window.time_type,
    )
}

/// Fetch and merge the requested signals.
pub fn run_fetch<P: SignalProvider + ?Sized>(
    provider: &P,
    args: &FetchArgs,
    metadata: Option<&SignalMetadata>,
) -> Result<MergedTable, AppError> {
    let window = resolve_window(&args.selection, &args.signals, metadata)?;
    let query = query_for(&args.selection, window).as_of(args.as_of);
    fetch_multi(provider, &query, &args.signals)
}

/// The two fetched series of a pair command and their shared window.
#[derive(Debug, Clone)]
pub struct PairData {
    pub series1: SignalSeries,
    pub series2: SignalSeries,
    pub window: SharedWindow,
}

pub fn fetch_pair<P: SignalProvider + ?Sized>(
    provider: &P,
    args: &PairArgs,
    metadata: Option<&SignalMetadata>,
) -> Result<PairData, AppError> {
    let keys = [args.series1.clone(), args.series2.clone()];
    let window = resolve_window(&args.selection, &keys, metadata)?;
    let query = query_for(&args.selection, window);
    Ok(PairData {
        series1: fetch(provider, &query, &args.series1)?,
        series2: fetch(provider, &query, &args.series2)?,
        window,
    })
}

/// Correlation of a pair at one lag.
pub fn run_correlate(pair: &PairData, args: &PairArgs, lag: i32) -> Result<Correlation, AppError> {
    correlate(
        &NativeCorrelation,
        &pair.series1,
        &pair.series2,
        args.group_by,
        lag,
        args.method,
    )
}

/// All outputs of a lag sweep.
#[derive(Debug, Clone)]
pub struct SweepOutput {
    pub result: LagSweepResult,
    /// `Err` when no lag has a defined correlation.
    pub best: Result<(i32, f64), AppError>,
}

pub fn run_sweep(
    pair: &PairData,
    args: &PairArgs,
    max_lag: Option<u32>,
    control: &mut SweepControl<'_>,
) -> Result<SweepOutput, AppError> {
    let max_lag = max_lag.unwrap_or_else(|| {
        default_max_lag(pair.window.start, pair.window.end, pair.window.time_type)
    });
    log::info!(
        "sweeping {} vs {} over lags -{max_lag}..={max_lag}",
        args.series1,
        args.series2
    );
    let result = sweep(
        &NativeCorrelation,
        &pair.series1,
        &pair.series2,
        args.group_by,
        max_lag,
        args.method,
        control,
    )?;
    let best = best_lag(&result);
    Ok(SweepOutput { result, best })
}

/// Build a `ForecastSpec` from CLI arguments.
///
/// With a metadata table loaded, the time type and the default training start
/// (the signals' shared first date) come from it. Otherwise daily data is
/// assumed and training starts 90 days before the origin.
pub fn forecast_spec_from_args(
    args: &ForecastArgs,
    metadata: Option<&SignalMetadata>,
) -> Result<ForecastSpec, AppError> {
    let mut spec = ForecastSpec {
        geo_type: args.geo_type,
        geo_value: args.geo_value.clone(),
        time_type: TimeType::Day,
        predictors: args.predictors.clone(),
        predicted: args.predicted.clone(),
        forecaster: args.forecaster,
        horizon_days: args.horizon,
        origin_date: args.origin,
        training_start: args.origin,
        level: args.level,
    };

    let shared = metadata
        .map(|meta| meta.shared_dates(&spec.fetch_keys(), spec.geo_type))
        .transpose()?;
    spec.training_start = match (args.training_start, &shared) {
        (Some(start), _) => start,
        (None, Some(window)) => window.start,
        (None, None) => args
            .origin
            .checked_sub_signed(Duration::days(DEFAULT_TRAINING_DAYS))
            .ok_or_else(|| AppError::usage(format!("Origin {} is too early.", args.origin)))?,
    };
    if let Some(window) = shared {
        spec.time_type = window.time_type;
        warn_outside(&window, spec.training_start, args.origin);
    }
    Ok(spec)
}

fn warn_outside(window: &SharedWindow, start: NaiveDate, end: NaiveDate) {
    if start < window.start || end > window.end {
        log::warn!(
            "requested {start} .. {end} extends beyond the published window {} .. {}",
            window.start,
            window.end
        );
    }
}

pub fn run_forecast<P: SignalProvider + ?Sized>(
    provider: &P,
    spec: &ForecastSpec,
) -> Result<ForecastComparison, AppError> {
    log::info!(
        "forecasting {} with {} (origin {}, horizon {}d)",
        spec.predicted,
        spec.forecaster.display_name(),
        spec.origin_date,
        spec.horizon_days
    );
    evaluate(provider, &BuiltinForecaster, spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticProvider;
    use crate::domain::{CorrelationGrouping, CorrelationMethod, GeoType};
    use crate::error::ErrorKind;
    use crate::lag::NoProgress;

    const META: &str = "\
data_source,signal,geo_type,min_time,max_time,time_type
src,cases,state,2021-01-01,2021-06-30,day
src,deaths,state,2021-02-01,2021-07-31,day
src,weekly,state,202101,202126,week
";

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn selection() -> SelectionArgs {
        SelectionArgs {
            geo_type: GeoType::State,
            geo_value: "pa".to_string(),
            start: None,
            end: None,
            time_type: None,
        }
    }

    fn meta() -> SignalMetadata {
        SignalMetadata::from_reader(META.as_bytes()).unwrap()
    }

    fn keys(names: &[&str]) -> Vec<SignalKey> {
        names.iter().map(|n| SignalKey::new("src", *n)).collect()
    }

    #[test]
    fn window_comes_from_metadata_when_missing() {
        let window = resolve_window(&selection(), &keys(&["cases", "deaths"]), Some(&meta())).unwrap();
        assert_eq!(window.start, d(2021, 2, 1));
        assert_eq!(window.end, d(2021, 6, 30));
        assert_eq!(window.time_type, TimeType::Day);

        let mut explicit = selection();
        explicit.start = Some(d(2021, 3, 1));
        let window = resolve_window(&explicit, &keys(&["cases", "deaths"]), Some(&meta())).unwrap();
        assert_eq!(window.start, d(2021, 3, 1));
    }

    #[test]
    fn window_needs_metadata_or_explicit_dates() {
        let err = resolve_window(&selection(), &keys(&["cases"]), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);

        let mut wrong = selection();
        wrong.time_type = Some(TimeType::Week);
        let err = resolve_window(&wrong, &keys(&["cases"]), Some(&meta())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputMismatch);

        let mut county = selection();
        county.geo_type = GeoType::County;
        county.start = Some(d(2021, 1, 1));
        county.end = Some(d(2021, 2, 1));
        county.time_type = Some(TimeType::Day);
        let err = resolve_window(&county, &keys(&["cases"]), Some(&meta())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputMismatch);
    }

    #[test]
    fn sweep_defaults_max_lag_to_half_the_window() {
        let args = PairArgs {
            selection: SelectionArgs {
                start: Some(d(2021, 3, 1)),
                end: Some(d(2021, 3, 21)),
                time_type: Some(TimeType::Day),
                ..selection()
            },
            series1: SignalKey::new("src", "cases"),
            series2: SignalKey::new("src", "deaths"),
            method: CorrelationMethod::Pearson,
            group_by: CorrelationGrouping::GeoValue,
        };
        let provider = SyntheticProvider::new(11);
        let pair = fetch_pair(&provider, &args, None).unwrap();
        let out = run_sweep(&pair, &args, None, &mut SweepControl::new(&mut NoProgress)).unwrap();

        assert_eq!(out.result.max_lag, 10);
        assert_eq!(out.result.len(), 21);
        assert!(out.best.is_ok());
    }

    #[test]
    fn forecast_spec_picks_up_weekly_time_type() {
        let args = ForecastArgs {
            geo_type: GeoType::State,
            geo_value: "pa".to_string(),
            predictors: Vec::new(),
            predicted: SignalKey::new("src", "weekly"),
            forecaster: crate::domain::ForecasterKind::Flatline,
            horizon: 7,
            origin: d(2021, 5, 1),
            training_start: None,
            level: 0.9,
            export: None,
        };
        let spec = forecast_spec_from_args(&args, Some(&meta())).unwrap();
        assert_eq!(spec.time_type, TimeType::Week);

        let err = run_forecast(&SyntheticProvider::new(1), &spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputMismatch);
    }

    #[test]
    fn training_starts_at_the_shared_first_date_when_metadata_is_loaded() {
        let mut args = ForecastArgs {
            geo_type: GeoType::State,
            geo_value: "pa".to_string(),
            predictors: vec![SignalKey::new("src", "cases")],
            predicted: SignalKey::new("src", "deaths"),
            forecaster: crate::domain::ForecasterKind::Arx,
            horizon: 7,
            origin: d(2021, 5, 1),
            training_start: None,
            level: 0.9,
            export: None,
        };
        let spec = forecast_spec_from_args(&args, Some(&meta())).unwrap();
        assert_eq!(spec.training_start, d(2021, 2, 1));
        assert_eq!(spec.time_type, TimeType::Day);

        let spec = forecast_spec_from_args(&args, None).unwrap();
        assert_eq!(spec.training_start, d(2021, 1, 31));

        args.training_start = Some(d(2021, 3, 15));
        let spec = forecast_spec_from_args(&args, Some(&meta())).unwrap();
        assert_eq!(spec.training_start, d(2021, 3, 15));
    }
}
