//! The aligned, wide representation of several signals.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{GeoType, Observation, SignalKey, SignalSeries, TimeType};
use crate::error::AppError;

/// Identity of one value column.
///
/// Columns are located by their `SignalKey`; `position` is the index of the
/// input series the column came from, which keeps two inputs with the same key
/// (e.g. a series merged with itself) distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnId {
    pub key: SignalKey,
    pub position: usize,
}

/// One timestamp with one value per column, in column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    pub time_value: NaiveDate,
    pub values: Vec<f64>,
}

/// Several signals inner-joined on `time_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedTable {
    pub(crate) geo_type: GeoType,
    pub(crate) geo_value: String,
    pub(crate) time_type: TimeType,
    pub(crate) columns: Vec<ColumnId>,
    pub(crate) rows: Vec<MergedRow>,
}

impl MergedTable {
    pub fn geo_type(&self) -> GeoType {
        self.geo_type
    }

    pub fn geo_value(&self) -> &str {
        &self.geo_value
    }

    pub fn time_type(&self) -> TimeType {
        self.time_type
    }

    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }

    pub fn rows(&self) -> &[MergedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column holding `key`.
    pub fn column_index(&self, key: &SignalKey) -> Option<usize> {
        self.columns.iter().position(|c| &c.key == key)
    }

    pub fn require_column(&self, key: &SignalKey) -> Result<usize, AppError> {
        self.column_index(key).ok_or_else(|| {
            AppError::input_mismatch(format!("Signal {key} is not a column of the merged table."))
        })
    }

    /// Export-friendly column labels, `value_{source}_{signal}`, in column order.
    ///
    /// Labels are derived from the typed ids and never parsed back. When two
    /// columns render the same label (a repeated key, or keys like `a_b:c` and
    /// `a:b_c`), each of them gets its 1-based position appended.
    pub fn column_labels(&self) -> Vec<String> {
        let bases: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("value_{}_{}", c.key.source, c.key.signal))
            .collect();
        bases
            .iter()
            .zip(&self.columns)
            .map(|(base, col)| {
                if bases.iter().filter(|b| *b == base).count() > 1 {
                    format!("{base}_{}", col.position + 1)
                } else {
                    base.clone()
                }
            })
            .collect()
    }

    pub fn values(&self, idx: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(move |r| r.values[idx])
    }

    pub fn time_values(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.iter().map(|r| r.time_value)
    }

    pub fn last_time_value(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.time_value)
    }

    /// Latest value of a column at or before `date`.
    pub fn last_value_at_or_before(&self, idx: usize, date: NaiveDate) -> Option<(NaiveDate, f64)> {
        self.rows
            .iter()
            .rev()
            .find(|r| r.time_value <= date)
            .map(|r| (r.time_value, r.values[idx]))
    }

    /// Split one column back out as a standalone series.
    pub fn extract(&self, idx: usize) -> Result<SignalSeries, AppError> {
        let col = self
            .columns
            .get(idx)
            .ok_or_else(|| AppError::usage(format!("Column index {idx} out of range.")))?;
        let observations = self
            .rows
            .iter()
            .map(|r| Observation {
                time_value: r.time_value,
                value: r.values[idx],
            })
            .collect();
        SignalSeries::new(
            self.geo_type,
            self.geo_value.clone(),
            col.key.clone(),
            self.time_type,
            observations,
        )
    }

    /// All columns as standalone series, in column order.
    pub fn extract_all(&self) -> Result<Vec<SignalSeries>, AppError> {
        (0..self.columns.len()).map(|idx| self.extract(idx)).collect()
    }
}
