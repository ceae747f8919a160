//! Export results to CSV and JSON.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream
//! scripts:
//! - merged table CSV: `time_value` plus one `value_{source}_{signal}` column per signal
//! - sweep CSV: one row per lag, `cor` left empty when undefined
//! - forecast JSON: both runs, realized values and scores

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{
    DataState, ForecastPoint, ForecasterKind, GeoType, LagSweepResult, Observation, SignalKey,
};
use crate::error::AppError;
use crate::forecast::{ForecastComparison, ForecastRun};
use crate::lag::lag_in_days;
use crate::merge::MergedTable;
use crate::report::{ForecastScore, score_forecast};

/// Write a merged table as CSV.
pub fn write_merged_csv(path: &Path, table: &MergedTable) -> Result<(), AppError> {
    let mut writer = csv_writer(path)?;

    let mut header = vec!["time_value".to_string()];
    header.extend(table.column_labels());
    writer.write_record(&header).map_err(write_err)?;

    for row in table.rows() {
        let mut record = vec![row.time_value.to_string()];
        record.extend(row.values.iter().map(|v| v.to_string()));
        writer.write_record(&record).map_err(write_err)?;
    }
    writer.flush().map_err(|e| AppError::io(format!("Failed to flush CSV: {e}")))
}

#[derive(Serialize)]
struct SweepRecord {
    lag: i32,
    lag_days: i64,
    cor: Option<f64>,
    n: usize,
    method: &'static str,
}

/// Write a lag sweep as CSV.
pub fn write_sweep_csv(path: &Path, result: &LagSweepResult) -> Result<(), AppError> {
    let mut writer = csv_writer(path)?;
    for (lag, cor) in result.iter() {
        writer
            .serialize(SweepRecord {
                lag,
                lag_days: lag_in_days(lag, result.time_type),
                cor: cor.value(),
                n: cor.n(),
                method: result.method.as_str(),
            })
            .map_err(write_err)?;
    }
    writer.flush().map_err(|e| AppError::io(format!("Failed to flush CSV: {e}")))
}

#[derive(Serialize)]
struct ForecastExport<'a> {
    geo_type: GeoType,
    geo_value: &'a str,
    predicted: String,
    predictors: Vec<String>,
    forecaster: ForecasterKind,
    origin: NaiveDate,
    horizon_days: u32,
    training_start: NaiveDate,
    runs: Vec<RunExport<'a>>,
    actual: &'a [Observation],
}

#[derive(Serialize)]
struct RunExport<'a> {
    data_state: DataState,
    points: Option<&'a [ForecastPoint]>,
    error: Option<String>,
    score: Option<ForecastScore>,
    history: &'a [Observation],
}

impl<'a> RunExport<'a> {
    fn new(run: &'a ForecastRun, cmp: &'a ForecastComparison) -> Self {
        match &run.result {
            Ok(result) => Self {
                data_state: run.data_state,
                points: Some(result.points.as_slice()),
                error: None,
                score: Some(score_forecast(result, &cmp.actual)),
                history: &run.history,
            },
            Err(e) => Self {
                data_state: run.data_state,
                points: None,
                error: Some(e.to_string()),
                score: None,
                history: &run.history,
            },
        }
    }
}

/// Write a forecast comparison as pretty-printed JSON.
pub fn write_forecast_json(path: &Path, cmp: &ForecastComparison) -> Result<(), AppError> {
    let spec = &cmp.spec;
    let export = ForecastExport {
        geo_type: spec.geo_type,
        geo_value: &spec.geo_value,
        predicted: spec.predicted.to_string(),
        predictors: spec.fetch_keys().iter().map(SignalKey::to_string).collect(),
        forecaster: spec.forecaster,
        origin: spec.origin_date,
        horizon_days: spec.horizon_days,
        training_start: spec.training_start,
        runs: vec![RunExport::new(&cmp.latest, cmp), RunExport::new(&cmp.as_of, cmp)],
        actual: cmp.actual.observations(),
    };

    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create forecast JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, &export)
        .map_err(|e| AppError::io(format!("Failed to write forecast JSON: {e}")))
}

fn csv_writer(path: &Path) -> Result<csv::Writer<File>, AppError> {
    csv::Writer::from_path(path)
        .map_err(|e| AppError::io(format!("Failed to create export CSV '{}': {e}", path.display())))
}

fn write_err(e: csv::Error) -> AppError {
    AppError::io(format!("Failed to write export CSV row: {e}"))
}
