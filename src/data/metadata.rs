//! Signal metadata table and date/geography negotiation.
//!
//! The table is a CSV with (at least) the columns
//! `data_source, signal, geo_type, min_time, max_time, time_type`, one row per
//! `(source, signal, geo_type)`. It is read-only input used to offer the
//! geographies and date window two or more signals have in common.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::data::epiweek::{parse_yyyymmdd, parse_yyyyww};
use crate::domain::{GeoType, SignalKey, TimeType};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRow {
    pub key: SignalKey,
    pub geo_type: GeoType,
    pub min_time: NaiveDate,
    pub max_time: NaiveDate,
    pub time_type: TimeType,
}

#[derive(Debug, Deserialize)]
struct RawRow {
    data_source: String,
    signal: String,
    geo_type: String,
    min_time: String,
    max_time: String,
    time_type: String,
}

/// Common availability of a set of signals for one geo type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub time_type: TimeType,
}

#[derive(Debug, Clone, Default)]
pub struct SignalMetadata {
    rows: Vec<MetadataRow>,
}

impl SignalMetadata {
    pub fn from_rows(rows: Vec<MetadataRow>) -> Self {
        Self { rows }
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::io(format!("Failed to open metadata CSV '{}': {e}", path.display())))?;
        Self::from_reader(file)
    }

    /// Parse metadata CSV. Rows with an unknown geo type (e.g. `dma`) are skipped.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (idx, record) in reader.deserialize::<RawRow>().enumerate() {
            // +2: header line plus 1-based numbering.
            let line = idx + 2;
            let raw = record
                .map_err(|e| AppError::invalid_data(format!("Metadata CSV line {line}: {e}")))?;
            let Ok(geo_type) = raw.geo_type.parse::<GeoType>() else {
                log::debug!("metadata line {line}: skipping geo_type '{}'", raw.geo_type);
                continue;
            };
            let time_type: TimeType = raw
                .time_type
                .parse()
                .map_err(|e| AppError::invalid_data(format!("Metadata CSV line {line}: {e}")))?;
            let min_time = parse_time(&raw.min_time, time_type)
                .ok_or_else(|| AppError::invalid_data(format!("Metadata CSV line {line}: bad min_time '{}'.", raw.min_time)))?;
            let max_time = parse_time(&raw.max_time, time_type)
                .ok_or_else(|| AppError::invalid_data(format!("Metadata CSV line {line}: bad max_time '{}'.", raw.max_time)))?;
            rows.push(MetadataRow {
                key: SignalKey::new(raw.data_source, raw.signal),
                geo_type,
                min_time,
                max_time,
                time_type,
            });
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[MetadataRow] {
        &self.rows
    }

    /// Geo types a signal is published at.
    pub fn signal_geo_types(&self, key: &SignalKey) -> BTreeSet<GeoType> {
        self.rows
            .iter()
            .filter(|r| &r.key == key)
            .map(|r| r.geo_type)
            .collect()
    }

    /// Geo types every signal in `keys` is published at.
    pub fn shared_geo_types(&self, keys: &[SignalKey]) -> BTreeSet<GeoType> {
        let mut iter = keys.iter();
        let Some(first) = iter.next() else {
            return BTreeSet::new();
        };
        iter.fold(self.signal_geo_types(first), |acc, key| {
            acc.intersection(&self.signal_geo_types(key)).copied().collect()
        })
    }

    /// `(min_time, max_time, time_type)` of one signal at one geo type.
    ///
    /// Each signal is assumed to have a single reporting frequency per geo type.
    pub fn signal_dates(&self, key: &SignalKey, geo_type: GeoType) -> Result<SharedWindow, AppError> {
        let mut matches = self.rows.iter().filter(|r| &r.key == key && r.geo_type == geo_type);
        let row = matches.next().ok_or_else(|| {
            AppError::input_mismatch(format!("No metadata for {key} at geo_type '{geo_type}'."))
        })?;
        if matches.next().is_some() {
            return Err(AppError::invalid_data(format!(
                "Metadata lists more than one reporting frequency for {key} at geo_type '{geo_type}'."
            )));
        }
        Ok(SharedWindow {
            start: row.min_time,
            end: row.max_time,
            time_type: row.time_type,
        })
    }

    /// Intersection of the signals' date windows at one geo type.
    ///
    /// Signals with different reporting frequencies cannot be compared.
    pub fn shared_dates(&self, keys: &[SignalKey], geo_type: GeoType) -> Result<SharedWindow, AppError> {
        let (first, rest) = keys
            .split_first()
            .ok_or_else(|| AppError::usage("No signals given for date negotiation."))?;
        let mut shared = self.signal_dates(first, geo_type)?;
        for key in rest {
            let window = self.signal_dates(key, geo_type)?;
            if window.time_type != shared.time_type {
                return Err(AppError::input_mismatch(format!(
                    "Signals must share a reporting frequency: {first} is '{}' but {key} is '{}'.",
                    shared.time_type, window.time_type
                )));
            }
            shared.start = shared.start.max(window.start);
            shared.end = shared.end.min(window.end);
        }
        if shared.start > shared.end {
            return Err(AppError::input_mismatch(format!(
                "Signals have no dates in common at geo_type '{geo_type}'."
            )));
        }
        Ok(shared)
    }
}

/// Default maximum lag: half of the window, in native units.
pub fn default_max_lag(start: NaiveDate, end: NaiveDate, time_type: TimeType) -> u32 {
    let days = (end - start).num_days().max(0);
    let units = match time_type {
        TimeType::Day => days,
        TimeType::Week => days / 7,
    };
    u32::try_from(units / 2).unwrap_or(u32::MAX)
}

fn parse_time(raw: &str, time_type: TimeType) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    let value: i64 = raw.parse().ok()?;
    match (time_type, raw.len()) {
        (_, 8) => parse_yyyymmdd(value),
        (TimeType::Week, 6) => parse_yyyyww(value),
        _ => None,
    }
}
