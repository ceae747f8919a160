//! Multi-signal merge engine.
//!
//! Aligns independently fetched series on a common time axis:
//!
//! 1. all inputs must agree on `geo_type`, `geo_value` and `time_type`
//! 2. rows are inner-joined on `time_value` (a timestamp survives only if every
//!    input has it)
//! 3. each input contributes one column, identified by its `SignalKey`
//!
//! A single input is accepted and yields a one-column table.

pub mod table;

pub use table::*;

use crate::domain::SignalSeries;
use crate::error::AppError;

/// Merge `series` into one table keyed by timestamp.
pub fn merge(series: &[SignalSeries]) -> Result<MergedTable, AppError> {
    let Some(first) = series.first() else {
        return Err(AppError::usage("Cannot merge an empty list of signals."));
    };

    for other in &series[1..] {
        check_compatible(first, other)?;
    }

    let mut rows: Vec<MergedRow> = first
        .observations()
        .iter()
        .map(|o| MergedRow {
            time_value: o.time_value,
            values: vec![o.value],
        })
        .collect();

    for other in &series[1..] {
        rows = join_sorted(rows, other);
    }

    let columns = series
        .iter()
        .enumerate()
        .map(|(position, s)| ColumnId {
            key: s.key().clone(),
            position,
        })
        .collect();

    log::debug!(
        "merged {} signal(s) for {} '{}': {} row(s)",
        series.len(),
        first.geo_type(),
        first.geo_value(),
        rows.len()
    );

    Ok(MergedTable {
        geo_type: first.geo_type(),
        geo_value: first.geo_value().to_string(),
        time_type: first.time_type(),
        columns,
        rows,
    })
}

fn check_compatible(a: &SignalSeries, b: &SignalSeries) -> Result<(), AppError> {
    if a.geo_type() != b.geo_type() {
        return Err(AppError::input_mismatch(format!(
            "geo_type mismatch: {} has '{}' but {} has '{}'.",
            a.key(),
            a.geo_type(),
            b.key(),
            b.geo_type()
        )));
    }
    if a.geo_value() != b.geo_value() {
        return Err(AppError::input_mismatch(format!(
            "geo_value mismatch: {} has '{}' but {} has '{}'.",
            a.key(),
            a.geo_value(),
            b.key(),
            b.geo_value()
        )));
    }
    if a.time_type() != b.time_type() {
        return Err(AppError::input_mismatch(format!(
            "time_type mismatch: {} has '{}' but {} has '{}'.",
            a.key(),
            a.time_type(),
            b.key(),
            b.time_type()
        )));
    }
    Ok(())
}

/// Inner join of already-sorted rows against a sorted series.
fn join_sorted(rows: Vec<MergedRow>, series: &SignalSeries) -> Vec<MergedRow> {
    let obs = series.observations();
    let mut out = Vec::with_capacity(rows.len().min(obs.len()));
    let mut j = 0;
    for mut row in rows {
        while j < obs.len() && obs[j].time_value < row.time_value {
            j += 1;
        }
        if j == obs.len() {
            break;
        }
        if obs[j].time_value == row.time_value {
            row.values.push(obs[j].value);
            out.push(row);
        }
    }
    out
}
