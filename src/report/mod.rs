//! Reporting utilities: forecast scores and formatted terminal output.

pub mod format;

pub use format::*;

use serde::Serialize;

use crate::domain::{ForecastResult, SignalSeries};

/// Accuracy of one forecast trajectory against realized values.
///
/// Only target dates with a realized value count; the anchor point is excluded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastScore {
    pub matched: usize,
    /// Mean absolute error of the point predictions.
    pub mae: Option<f64>,
    /// Fraction of realized values inside `[lower, upper]`.
    pub coverage: Option<f64>,
}

pub fn score_forecast(result: &ForecastResult, actual: &SignalSeries) -> ForecastScore {
    let mut matched = 0usize;
    let mut abs_err = 0.0;
    let mut covered = 0usize;
    for point in result.forecast_points() {
        let Some(value) = actual.value_at(point.target_date) else {
            continue;
        };
        matched += 1;
        abs_err += (point.pred - value).abs();
        if point.lower <= value && value <= point.upper {
            covered += 1;
        }
    }

    if matched == 0 {
        return ForecastScore {
            matched,
            mae: None,
            coverage: None,
        };
    }
    ForecastScore {
        matched,
        mae: Some(abs_err / matched as f64),
        coverage: Some(covered as f64 / matched as f64),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::domain::{DataState, ForecastPoint, ForecasterKind, GeoType, Observation, SignalKey, TimeType};

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, 10).unwrap() + Duration::days(offset)
    }

    fn result() -> ForecastResult {
        let point = |offset: i64, pred: f64, lower: f64, upper: f64| ForecastPoint {
            target_date: day(offset),
            pred,
            lower,
            upper,
        };
        ForecastResult {
            origin: day(0),
            horizon_days: 3,
            data_state: DataState::Latest,
            forecaster: ForecasterKind::Flatline,
            points: vec![
                point(0, 100.0, 100.0, 100.0),
                point(1, 10.0, 8.0, 12.0),
                point(2, 10.0, 8.0, 12.0),
                point(3, 10.0, 8.0, 12.0),
            ],
        }
    }

    #[test]
    fn mae_and_coverage_skip_the_anchor_and_missing_dates() {
        let actual = SignalSeries::new(
            GeoType::Nation,
            "us",
            SignalKey::new("a", "b"),
            TimeType::Day,
            vec![
                Observation { time_value: day(0), value: 0.0 },
                Observation { time_value: day(1), value: 11.0 },
                Observation { time_value: day(3), value: 16.0 },
            ],
        )
        .unwrap();

        let score = score_forecast(&result(), &actual);
        assert_eq!(score.matched, 2);
        assert_eq!(score.mae, Some(3.5));
        assert_eq!(score.coverage, Some(0.5));
    }

    #[test]
    fn no_overlap_scores_nothing() {
        let actual = SignalSeries::new(
            GeoType::Nation,
            "us",
            SignalKey::new("a", "b"),
            TimeType::Day,
            vec![Observation { time_value: day(20), value: 1.0 }],
        )
        .unwrap();
        let score = score_forecast(&result(), &actual);
        assert_eq!(score.matched, 0);
        assert!(score.mae.is_none());
    }
}
