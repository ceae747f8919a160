//! The narrow contract between the core and an external signal provider.
//!
//! A provider answers one request for one `(source, signal)` pair and returns
//! raw rows. Normalization into a `SignalSeries` happens in `data::fetch`, so
//! every provider (HTTP, synthetic, test doubles) shares the same validation.

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::NaiveDate;

use crate::data::epiweek::NativeRange;
use crate::domain::{GeoType, SignalKey, TimeType};
use crate::error::AppError;

/// One provider request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    pub geo_type: GeoType,
    pub geo_value: String,
    pub key: SignalKey,
    pub range: NativeRange,
    pub time_type: TimeType,
    /// Revision date; `None` asks for the latest revision.
    pub as_of: Option<NaiveDate>,
}

impl FetchRequest {
    /// Short human-readable description for error messages.
    pub fn describe(&self) -> String {
        let revision = match self.as_of {
            Some(date) => format!("as of {date}"),
            None => "latest".to_string(),
        };
        format!(
            "{} for {} '{}' ({} range {}, {revision})",
            self.key,
            self.geo_type,
            self.geo_value,
            self.time_type,
            self.range.to_query()
        )
    }
}

/// One raw row returned by a provider.
///
/// `time_value` is a day offset from 1970-01-01.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRow {
    pub time_value: i64,
    pub value: f64,
    pub geo_type: GeoType,
    pub geo_value: String,
    pub time_type: TimeType,
    pub key: SignalKey,
}

/// External time-series source.
///
/// Implementations report failures as `ErrorKind::Fetch`. Retries, if any,
/// belong inside the implementation.
pub trait SignalProvider {
    fn fetch_rows(&self, request: &FetchRequest) -> Result<Vec<ProviderRow>, AppError>;
}

impl<P: SignalProvider + ?Sized> SignalProvider for &P {
    fn fetch_rows(&self, request: &FetchRequest) -> Result<Vec<ProviderRow>, AppError> {
        (**self).fetch_rows(request)
    }
}

impl<P: SignalProvider + ?Sized> SignalProvider for Box<P> {
    fn fetch_rows(&self, request: &FetchRequest) -> Result<Vec<ProviderRow>, AppError> {
        (**self).fetch_rows(request)
    }
}

/// Memoizes successful responses of an inner provider.
///
/// The cache is keyed by the full request (revision date included) and lives
/// as long as the caller keeps this value around.
pub struct CachedProvider<P> {
    inner: P,
    cache: RefCell<HashMap<FetchRequest, Vec<ProviderRow>>>,
}

impl<P: SignalProvider> CachedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn cached_requests(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl<P: SignalProvider> SignalProvider for CachedProvider<P> {
    fn fetch_rows(&self, request: &FetchRequest) -> Result<Vec<ProviderRow>, AppError> {
        if let Some(rows) = self.cache.borrow().get(request) {
            log::debug!("cache hit: {}", request.describe());
            return Ok(rows.clone());
        }
        let rows = self.inner.fetch_rows(request)?;
        self.cache.borrow_mut().insert(request.clone(), rows.clone());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct CountingProvider {
        calls: Cell<usize>,
    }

    impl SignalProvider for CountingProvider {
        fn fetch_rows(&self, request: &FetchRequest) -> Result<Vec<ProviderRow>, AppError> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![ProviderRow {
                time_value: 18628,
                value: if request.as_of.is_some() { 1.0 } else { 2.0 },
                geo_type: request.geo_type,
                geo_value: request.geo_value.clone(),
                time_type: request.time_type,
                key: request.key.clone(),
            }])
        }
    }

    fn request(as_of: Option<NaiveDate>) -> FetchRequest {
        FetchRequest {
            geo_type: GeoType::Nation,
            geo_value: "us".to_string(),
            key: SignalKey::new("src", "sig"),
            range: NativeRange {
                start: 20210101,
                end: 20210131,
            },
            time_type: TimeType::Day,
            as_of,
        }
    }

    #[test]
    fn cache_separates_latest_and_as_of_requests() {
        let cached = CachedProvider::new(CountingProvider { calls: Cell::new(0) });
        let as_of = NaiveDate::from_ymd_opt(2021, 2, 1);

        let latest = cached.fetch_rows(&request(None)).unwrap();
        let revised = cached.fetch_rows(&request(as_of)).unwrap();
        let latest_again = cached.fetch_rows(&request(None)).unwrap();

        assert_eq!(latest[0].value, 2.0);
        assert_eq!(revised[0].value, 1.0);
        assert_eq!(latest_again, latest);
        assert_eq!(cached.inner.calls.get(), 2);
        assert_eq!(cached.cached_requests(), 2);
    }
}
