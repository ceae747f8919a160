//! Signal fetch adapter.
//!
//! Turns a calendar-date query into the provider's native range encoding,
//! calls the provider once per signal, and normalizes the raw rows into a
//! validated `SignalSeries`. No retries happen here.

use chrono::NaiveDate;

use crate::data::epiweek::{date_from_day_offset, native_range};
use crate::data::provider::{FetchRequest, ProviderRow, SignalProvider};
use crate::domain::{GeoType, Observation, SignalKey, SignalSeries, TimeType};
use crate::error::{AppError, ErrorKind};
use crate::merge::{MergedTable, merge};

/// Geography, window and revision shared by one or more signal fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalQuery {
    pub geo_type: GeoType,
    pub geo_value: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub time_type: TimeType,
    pub as_of: Option<NaiveDate>,
}

impl SignalQuery {
    pub fn new(
        geo_type: GeoType,
        geo_value: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
        time_type: TimeType,
    ) -> Self {
        Self {
            geo_type,
            geo_value: geo_value.into(),
            start,
            end,
            time_type,
            as_of: None,
        }
    }

    /// The same query pinned to a revision date.
    pub fn as_of(&self, as_of: Option<NaiveDate>) -> Self {
        Self {
            as_of,
            ..self.clone()
        }
    }

    /// The same query over a different window.
    pub fn with_window(&self, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            ..self.clone()
        }
    }

    fn request(&self, key: &SignalKey) -> FetchRequest {
        FetchRequest {
            geo_type: self.geo_type,
            geo_value: self.geo_value.clone(),
            key: key.clone(),
            range: native_range(self.time_type, self.start, self.end),
            time_type: self.time_type,
            as_of: self.as_of,
        }
    }
}

/// Fetch one signal.
pub fn fetch<P: SignalProvider + ?Sized>(
    provider: &P,
    query: &SignalQuery,
    key: &SignalKey,
) -> Result<SignalSeries, AppError> {
    if query.start > query.end {
        return Err(AppError::usage(format!(
            "Start date {} is after end date {}.",
            query.start, query.end
        )));
    }

    let request = query.request(key);
    log::debug!("fetching {}", request.describe());

    let rows = provider.fetch_rows(&request).map_err(|e| match e.kind() {
        ErrorKind::Fetch => e,
        _ => AppError::fetch(format!("Fetching {} failed: {e}", request.describe())),
    })?;

    if rows.is_empty() {
        return Err(AppError::fetch(format!(
            "No observations returned for {}.",
            request.describe()
        )));
    }

    normalize_rows(&request, rows)
}

/// Fetch several signals over one shared query and merge them.
pub fn fetch_multi<P: SignalProvider + ?Sized>(
    provider: &P,
    query: &SignalQuery,
    keys: &[SignalKey],
) -> Result<MergedTable, AppError> {
    let series = keys
        .iter()
        .map(|key| fetch(provider, query, key))
        .collect::<Result<Vec<_>, _>>()?;
    merge(&series)
}

fn normalize_rows(request: &FetchRequest, rows: Vec<ProviderRow>) -> Result<SignalSeries, AppError> {
    let mut observations = Vec::with_capacity(rows.len());
    for row in rows {
        if row.geo_type != request.geo_type
            || row.geo_value != request.geo_value
            || row.time_type != request.time_type
            || row.key != request.key
        {
            return Err(AppError::input_mismatch(format!(
                "Provider returned a row for {} {} '{}' ({}) in response to {}.",
                row.key,
                row.geo_type,
                row.geo_value,
                row.time_type,
                request.describe()
            )));
        }
        let time_value = date_from_day_offset(row.time_value).ok_or_else(|| {
            AppError::fetch(format!(
                "Invalid day offset {} in response to {}.",
                row.time_value,
                request.describe()
            ))
        })?;
        if !row.value.is_finite() {
            continue;
        }
        observations.push(Observation {
            time_value,
            value: row.value,
        });
    }

    if observations.is_empty() {
        return Err(AppError::fetch(format!(
            "No finite observations returned for {}.",
            request.describe()
        )));
    }

    SignalSeries::new(
        request.geo_type,
        request.geo_value.clone(),
        request.key.clone(),
        request.time_type,
        observations,
    )
    .map_err(|e| AppError::fetch(format!("{e} ({})", request.describe())))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::data::epiweek::days_since_epoch;

    /// Serves fixed values per signal name and records requests.
    struct FixedProvider {
        seen: RefCell<Vec<FetchRequest>>,
    }

    impl FixedProvider {
        fn new() -> Self {
            Self {
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl SignalProvider for FixedProvider {
        fn fetch_rows(&self, request: &FetchRequest) -> Result<Vec<ProviderRow>, AppError> {
            self.seen.borrow_mut().push(request.clone());
            if request.key.signal == "missing" {
                return Ok(Vec::new());
            }
            if request.key.signal == "broken" {
                return Err(AppError::fetch("rate limited"));
            }
            let start = days_since_epoch(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
            let offset = if request.key.signal == "late" { 2 } else { 0 };
            Ok((0..5)
                .map(|i| ProviderRow {
                    time_value: start + offset + i,
                    value: i as f64,
                    geo_type: request.geo_type,
                    geo_value: request.geo_value.clone(),
                    time_type: request.time_type,
                    key: request.key.clone(),
                })
                .collect())
        }
    }

    fn query() -> SignalQuery {
        SignalQuery::new(
            GeoType::State,
            "ny",
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 1, 31).unwrap(),
            TimeType::Day,
        )
    }

    #[test]
    fn day_offsets_become_calendar_dates() {
        let provider = FixedProvider::new();
        let s = fetch(&provider, &query(), &SignalKey::new("src", "sig")).unwrap();

        assert_eq!(s.len(), 5);
        assert_eq!(s.observations()[0].time_value, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(s.observations()[4].time_value, NaiveDate::from_ymd_opt(2021, 1, 5).unwrap());

        let seen = provider.seen.borrow();
        assert_eq!(seen[0].range.start, 20210101);
        assert_eq!(seen[0].range.end, 20210131);
        assert_eq!(seen[0].as_of, None);
    }

    #[test]
    fn as_of_is_forwarded_to_the_provider() {
        let provider = FixedProvider::new();
        let as_of = NaiveDate::from_ymd_opt(2021, 3, 1);
        fetch(&provider, &query().as_of(as_of), &SignalKey::new("src", "sig")).unwrap();
        assert_eq!(provider.seen.borrow()[0].as_of, as_of);
    }

    #[test]
    fn empty_and_failed_responses_are_fetch_errors() {
        let provider = FixedProvider::new();

        let err = fetch(&provider, &query(), &SignalKey::new("src", "missing")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert!(err.message().contains("src:missing"));

        let err = fetch(&provider, &query(), &SignalKey::new("src", "broken")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fetch);
    }

    #[test]
    fn inverted_window_is_rejected_before_calling_the_provider() {
        let provider = FixedProvider::new();
        let q = query().with_window(
            NaiveDate::from_ymd_opt(2021, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
        );
        let err = fetch(&provider, &q, &SignalKey::new("src", "sig")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(provider.seen.borrow().is_empty());
    }

    #[test]
    fn fetch_multi_merges_on_shared_dates() {
        let provider = FixedProvider::new();
        let keys = [SignalKey::new("src", "sig"), SignalKey::new("src", "late")];
        let table = fetch_multi(&provider, &query(), &keys).unwrap();

        // "late" covers Jan 3..7, "sig" covers Jan 1..5.
        assert_eq!(table.len(), 3);
        assert_eq!(table.columns().len(), 2);
        assert_eq!(table.column_index(&keys[1]), Some(1));
    }
}
