//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - passed between the fetch, merge, lag and forecast stages
//! - exported to JSON/CSV
//! - constructed directly in tests without touching the network

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Geographic granularity of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GeoType {
    Nation,
    State,
    County,
    Hrr,
    Hhs,
    Msa,
}

impl GeoType {
    pub const ALL: [GeoType; 6] = [
        GeoType::Nation,
        GeoType::State,
        GeoType::County,
        GeoType::Hrr,
        GeoType::Hhs,
        GeoType::Msa,
    ];

    /// Identifier used by the signal provider.
    pub fn as_str(self) -> &'static str {
        match self {
            GeoType::Nation => "nation",
            GeoType::State => "state",
            GeoType::County => "county",
            GeoType::Hrr => "hrr",
            GeoType::Hhs => "hhs",
            GeoType::Msa => "msa",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            GeoType::Nation => "Nation",
            GeoType::State => "State",
            GeoType::County => "County",
            GeoType::Hrr => "Hospital Referral Region",
            GeoType::Hhs => "HHS Region",
            GeoType::Msa => "Metropolitan Statistical Area",
        }
    }
}

impl fmt::Display for GeoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeoType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        GeoType::ALL
            .into_iter()
            .find(|g| g.as_str() == needle)
            .ok_or_else(|| AppError::invalid_data(format!("Unknown geo_type '{s}'.")))
    }
}

/// Reporting granularity of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeType {
    Day,
    Week,
}

impl TimeType {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeType::Day => "day",
            TimeType::Week => "week",
        }
    }

    /// Calendar days in one native time unit.
    pub fn days_per_unit(self) -> i64 {
        match self {
            TimeType::Day => 1,
            TimeType::Week => 7,
        }
    }
}

impl fmt::Display for TimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(TimeType::Day),
            "week" => Ok(TimeType::Week),
            other => Err(AppError::invalid_data(format!("Unknown time_type '{other}'."))),
        }
    }
}

/// A `(source, signal)` pair identifying one epidemiological quantity.
///
/// Written on the command line as `source:signal`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalKey {
    pub source: String,
    pub signal: String,
}

impl SignalKey {
    pub fn new(source: impl Into<String>, signal: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            signal: signal.into(),
        }
    }
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.signal)
    }
}

impl FromStr for SignalKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, signal) = s
            .split_once(':')
            .ok_or_else(|| AppError::usage(format!("Expected 'source:signal', got '{s}'.")))?;
        let (source, signal) = (source.trim(), signal.trim());
        if source.is_empty() || signal.is_empty() {
            return Err(AppError::usage(format!("Expected 'source:signal', got '{s}'.")));
        }
        Ok(SignalKey::new(source, signal))
    }
}

/// One observation of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub time_value: NaiveDate,
    pub value: f64,
}

/// One fetched signal for one region.
///
/// Observations are sorted by `time_value` with no duplicates. The series is
/// never mutated after construction; shifting produces a new series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSeries {
    geo_type: GeoType,
    geo_value: String,
    key: SignalKey,
    time_type: TimeType,
    observations: Vec<Observation>,
}

impl SignalSeries {
    /// Build a series, sorting observations by date.
    ///
    /// Fails with `InvalidData` if two observations share a timestamp.
    pub fn new(
        geo_type: GeoType,
        geo_value: impl Into<String>,
        key: SignalKey,
        time_type: TimeType,
        mut observations: Vec<Observation>,
    ) -> Result<Self, AppError> {
        observations.sort_by_key(|o| o.time_value);
        if let Some(pair) = observations.windows(2).find(|w| w[0].time_value == w[1].time_value) {
            return Err(AppError::invalid_data(format!(
                "Duplicate time_value {} in signal {key}.",
                pair[0].time_value
            )));
        }
        Ok(Self {
            geo_type,
            geo_value: geo_value.into(),
            key,
            time_type,
            observations,
        })
    }

    pub fn geo_type(&self) -> GeoType {
        self.geo_type
    }

    pub fn geo_value(&self) -> &str {
        &self.geo_value
    }

    pub fn key(&self) -> &SignalKey {
        &self.key
    }

    pub fn time_type(&self) -> TimeType {
        self.time_type
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn value_at(&self, date: NaiveDate) -> Option<f64> {
        self.observations
            .binary_search_by_key(&date, |o| o.time_value)
            .ok()
            .map(|idx| self.observations[idx].value)
    }

    /// A copy of this series with every timestamp moved by `days`.
    ///
    /// Ordering and uniqueness survive a uniform shift, so no re-validation is needed.
    /// Returns `None` if any shifted date falls outside the calendar range.
    pub fn shifted_by_days(&self, days: i64) -> Option<SignalSeries> {
        let delta = Duration::try_days(days)?;
        let observations = self
            .observations
            .iter()
            .map(|o| {
                o.time_value.checked_add_signed(delta).map(|time_value| Observation {
                    time_value,
                    value: o.value,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(SignalSeries {
            geo_type: self.geo_type,
            geo_value: self.geo_value.clone(),
            key: self.key.clone(),
            time_type: self.time_type,
            observations,
        })
    }
}

/// Correlation statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    Pearson,
    Kendall,
    Spearman,
}

impl CorrelationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            CorrelationMethod::Pearson => "pearson",
            CorrelationMethod::Kendall => "kendall",
            CorrelationMethod::Spearman => "spearman",
        }
    }
}

/// Key used to group aligned pairs before computing a correlation.
///
/// `GeoValue` correlates each region's whole aligned history. A merged table
/// holds one region, so this is a whole-series correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationGrouping {
    #[default]
    GeoValue,
}

/// Why a correlation could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedReason {
    /// Fewer than two aligned points.
    InsufficientOverlap,
    /// One side is constant over the aligned points.
    ZeroVariance,
}

/// A correlation coefficient, or an explicit marker that none exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Correlation {
    Defined { cor: f64, n: usize },
    Undefined { n: usize, reason: UndefinedReason },
}

impl Correlation {
    pub fn value(&self) -> Option<f64> {
        match self {
            Correlation::Defined { cor, .. } => Some(*cor),
            Correlation::Undefined { .. } => None,
        }
    }

    /// Coefficient as a float, `NaN` when undefined.
    pub fn as_f64(&self) -> f64 {
        self.value().unwrap_or(f64::NAN)
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Correlation::Defined { .. })
    }

    /// Number of aligned points the statistic was computed over.
    pub fn n(&self) -> usize {
        match self {
            Correlation::Defined { n, .. } | Correlation::Undefined { n, .. } => *n,
        }
    }
}

/// Correlation for every lag in `[-max_lag, max_lag]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagSweepResult {
    pub time_type: TimeType,
    pub method: CorrelationMethod,
    pub max_lag: u32,
    pub entries: BTreeMap<i32, Correlation>,
}

impl LagSweepResult {
    pub fn get(&self, lag: i32) -> Option<&Correlation> {
        self.entries.get(&lag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &Correlation)> {
        self.entries.iter().map(|(lag, cor)| (*lag, cor))
    }
}

/// Forecaster used by the forecast primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ForecasterKind {
    /// Autoregressive with exogenous inputs.
    Arx,
    /// Carry the last value forward.
    Flatline,
    /// Last value with random-walk interval widening.
    Baseline,
}

impl ForecasterKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ForecasterKind::Arx => "ARX forecaster",
            ForecasterKind::Flatline => "Flatline forecaster",
            ForecasterKind::Baseline => "Baseline forecaster",
        }
    }
}

/// Which revision of the data a forecast was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "date", rename_all = "snake_case")]
pub enum DataState {
    Latest,
    AsOf(NaiveDate),
}

impl fmt::Display for DataState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataState::Latest => f.write_str("latest"),
            DataState::AsOf(date) => write!(f, "as of {date}"),
        }
    }
}

/// A single point of a forecast trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub target_date: NaiveDate,
    pub pred: f64,
    pub lower: f64,
    pub upper: f64,
}

/// A forecast trajectory anchored at the origin.
///
/// `points[0]` is the zero-width anchor at `origin` carrying the last known
/// value; the remaining `horizon_days` points have strictly increasing target
/// dates `origin + 1 ..= origin + horizon_days`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub origin: NaiveDate,
    pub horizon_days: u32,
    pub data_state: DataState,
    pub forecaster: ForecasterKind,
    pub points: Vec<ForecastPoint>,
}

impl ForecastResult {
    pub fn anchor(&self) -> Option<&ForecastPoint> {
        self.points.first()
    }

    /// Forecast points without the synthetic anchor.
    pub fn forecast_points(&self) -> &[ForecastPoint] {
        self.points.get(1..).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn signal_key_parses_source_and_signal() {
        let key: SignalKey = "jhu-csse:confirmed_7dav_incidence_prop".parse().unwrap();
        assert_eq!(key.source, "jhu-csse");
        assert_eq!(key.signal, "confirmed_7dav_incidence_prop");
        assert_eq!(key.to_string(), "jhu-csse:confirmed_7dav_incidence_prop");

        assert!("no-separator".parse::<SignalKey>().is_err());
        assert!(":signal".parse::<SignalKey>().is_err());
    }

    #[test]
    fn series_sorts_and_rejects_duplicates() {
        let key = SignalKey::new("src", "sig");
        let s = SignalSeries::new(
            GeoType::State,
            "ca",
            key.clone(),
            TimeType::Day,
            vec![
                Observation { time_value: d(2021, 1, 3), value: 3.0 },
                Observation { time_value: d(2021, 1, 1), value: 1.0 },
            ],
        )
        .unwrap();
        assert_eq!(s.observations()[0].time_value, d(2021, 1, 1));
        assert_eq!(s.value_at(d(2021, 1, 3)), Some(3.0));
        assert_eq!(s.value_at(d(2021, 1, 2)), None);

        let err = SignalSeries::new(
            GeoType::State,
            "ca",
            key,
            TimeType::Day,
            vec![
                Observation { time_value: d(2021, 1, 1), value: 1.0 },
                Observation { time_value: d(2021, 1, 1), value: 2.0 },
            ],
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidData);
    }

    #[test]
    fn shifting_leaves_original_untouched() {
        let s = SignalSeries::new(
            GeoType::Nation,
            "us",
            SignalKey::new("a", "b"),
            TimeType::Day,
            vec![Observation { time_value: d(2021, 1, 10), value: 5.0 }],
        )
        .unwrap();
        let shifted = s.shifted_by_days(-3).unwrap();
        assert_eq!(shifted.observations()[0].time_value, d(2021, 1, 7));
        assert_eq!(s.observations()[0].time_value, d(2021, 1, 10));

        assert!(s.shifted_by_days(i64::MAX).is_none());
        assert!(s.shifted_by_days(-4_000_000_000).is_none());
    }

    #[test]
    fn undefined_correlation_is_nan_not_zero() {
        let c = Correlation::Undefined {
            n: 1,
            reason: UndefinedReason::InsufficientOverlap,
        };
        assert!(c.as_f64().is_nan());
        assert!(!c.is_defined());
    }
}
