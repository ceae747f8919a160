//! The forecasting primitive.
//!
//! Input: a merged training table, the predictor and predicted columns, a
//! forecaster and a horizon. Output: one row per target date with a point
//! prediction and interval bounds.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::ForecasterKind;
use crate::error::AppError;
use crate::merge::MergedTable;

/// Nominal coverage of the forecast intervals.
pub const DEFAULT_LEVEL: f64 = 0.9;

#[derive(Debug, Clone, Copy)]
pub struct ForecastRequest<'a> {
    pub table: &'a MergedTable,
    /// Feature columns. Includes `predicted`.
    pub predictors: &'a [usize],
    pub predicted: usize,
    pub forecaster: ForecasterKind,
    pub horizon_days: u32,
    /// Forecast origin; targets are `forecast_date + 1 ..= forecast_date + horizon_days`.
    pub forecast_date: NaiveDate,
    pub level: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastRow {
    pub target_date: NaiveDate,
    pub forecast_date: NaiveDate,
    pub pred: f64,
    pub pred_lower: f64,
    pub pred_upper: f64,
}

pub trait ForecastEngine {
    fn forecast(&self, request: &ForecastRequest<'_>) -> Result<Vec<ForecastRow>, AppError>;
}

impl<E: ForecastEngine + ?Sized> ForecastEngine for &E {
    fn forecast(&self, request: &ForecastRequest<'_>) -> Result<Vec<ForecastRow>, AppError> {
        (**self).forecast(request)
    }
}
