//! The correlation primitive.
//!
//! Input: an aligned table, two value columns, a grouping key and a method.
//! Output: one row per group carrying a `cor` value.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{Correlation, CorrelationGrouping, CorrelationMethod};
use crate::error::AppError;
use crate::math::correlation;
use crate::merge::MergedTable;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCorrelation {
    pub group: String,
    pub cor: Correlation,
}

pub trait CorrelationEngine {
    fn correlate(
        &self,
        table: &MergedTable,
        x: usize,
        y: usize,
        group_by: CorrelationGrouping,
        method: CorrelationMethod,
    ) -> Result<Vec<GroupCorrelation>, AppError>;
}

/// In-process implementation backed by `math::correlation`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCorrelation;

impl CorrelationEngine for NativeCorrelation {
    fn correlate(
        &self,
        table: &MergedTable,
        x: usize,
        y: usize,
        group_by: CorrelationGrouping,
        method: CorrelationMethod,
    ) -> Result<Vec<GroupCorrelation>, AppError> {
        let width = table.columns().len();
        if x >= width || y >= width {
            return Err(AppError::usage(format!(
                "Correlation columns ({x}, {y}) out of range for a {width}-column table."
            )));
        }

        // Groups come back sorted by key.
        let mut groups: BTreeMap<String, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
        match group_by {
            CorrelationGrouping::GeoValue => {
                // A merged table holds a single region; an empty table still
                // reports that region as one (undefined) group.
                groups.insert(table.geo_value().to_string(), (table.values(x).collect(), table.values(y).collect()));
            }
        }

        Ok(groups
            .into_iter()
            .map(|(group, (xs, ys))| GroupCorrelation {
                group,
                cor: correlation(method, &xs, &ys),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::domain::{GeoType, Observation, SignalKey, SignalSeries, TimeType};
    use crate::merge::merge;

    fn series(signal: &str, scale: f64) -> SignalSeries {
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        SignalSeries::new(
            GeoType::State,
            "ny",
            SignalKey::new("src", signal),
            TimeType::Day,
            (0..30)
                .map(|i| Observation {
                    time_value: start + Duration::days(i),
                    value: scale * ((i * 7) % 11) as f64,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn geo_grouping_is_one_whole_series_group() {
        let table = merge(&[series("a", 1.0), series("b", 2.0)]).unwrap();
        let groups = NativeCorrelation
            .correlate(&table, 0, 1, CorrelationGrouping::GeoValue, CorrelationMethod::Pearson)
            .unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group, "ny");
        assert_eq!(groups[0].cor.n(), 30);
        assert!((groups[0].cor.value().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_columns_are_rejected() {
        let table = merge(&[series("a", 1.0)]).unwrap();
        let err = NativeCorrelation
            .correlate(&table, 0, 1, CorrelationGrouping::GeoValue, CorrelationMethod::Spearman)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Usage);
    }
}
