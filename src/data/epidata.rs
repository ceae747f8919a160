//! Delphi Epidata `covidcast` endpoint integration.

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::data::epiweek::{days_since_epoch, parse_yyyymmdd, parse_yyyyww, to_yyyymmdd};
use crate::data::provider::{FetchRequest, ProviderRow, SignalProvider};
use crate::domain::{SignalKey, TimeType};
use crate::error::AppError;

const DEFAULT_BASE_URL: &str = "https://api.delphi.cmu.edu/epidata/covidcast/";

/// Epidata result code for a successful query.
const RESULT_OK: i64 = 1;
/// Epidata result code for a query that matched nothing.
const RESULT_NO_RESULTS: i64 = -2;
/// Epidata result code when the row limit truncated the response.
const RESULT_TRUNCATED: i64 = 2;

pub struct EpidataClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl EpidataClient {
    /// Build a client from `EPIDATA_BASE_URL` / `EPIDATA_API_KEY` (a `.env` file is honoured).
    ///
    /// Both variables are optional; anonymous access is rate limited by the provider.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let base_url = std::env::var("EPIDATA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = std::env::var("EPIDATA_API_KEY").ok().filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            log::info!("EPIDATA_API_KEY not set; using anonymous Epidata access");
        }
        Self::new(base_url, api_key)
    }

    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("siglag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::fetch(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
        })
    }
}

impl SignalProvider for EpidataClient {
    fn fetch_rows(&self, request: &FetchRequest) -> Result<Vec<ProviderRow>, AppError> {
        let mut params: Vec<(&str, String)> = vec![
            ("data_source", request.key.source.clone()),
            ("signals", request.key.signal.clone()),
            ("time_type", request.time_type.as_str().to_string()),
            ("geo_type", request.geo_type.as_str().to_string()),
            ("geo_values", request.geo_value.clone()),
            ("time_values", request.range.to_query()),
        ];
        if let Some(as_of) = request.as_of {
            params.push(("as_of", to_yyyymmdd(as_of).to_string()));
        }
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let resp = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .map_err(|e| AppError::fetch(format!("Epidata request failed for {}: {e}", request.describe())))?;

        if !resp.status().is_success() {
            return Err(AppError::fetch(format!(
                "Epidata request for {} failed with status {}.",
                request.describe(),
                resp.status()
            )));
        }

        let body: EpidataResponse = resp.json().map_err(|e| {
            AppError::fetch(format!(
                "Failed to parse Epidata response for {}: {e}",
                request.describe()
            ))
        })?;

        rows_from_response(request, body)
    }
}

#[derive(Debug, Deserialize)]
struct EpidataResponse {
    result: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    epidata: Option<Vec<EpidataRow>>,
}

#[derive(Debug, Deserialize)]
struct EpidataRow {
    time_value: i64,
    value: Option<f64>,
    geo_value: String,
    #[serde(default)]
    geo_type: Option<String>,
    #[serde(default)]
    time_type: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    signal: Option<String>,
}

fn rows_from_response(request: &FetchRequest, body: EpidataResponse) -> Result<Vec<ProviderRow>, AppError> {
    match body.result {
        RESULT_OK => {}
        RESULT_TRUNCATED => {
            log::warn!(
                "Epidata truncated the response for {}: {}",
                request.describe(),
                body.message
            );
        }
        RESULT_NO_RESULTS => return Ok(Vec::new()),
        code => {
            return Err(AppError::fetch(format!(
                "Epidata error {code} for {}: {}",
                request.describe(),
                body.message
            )));
        }
    }

    let mut out = Vec::new();
    for row in body.epidata.unwrap_or_default() {
        // Missing values are reported as null.
        let Some(value) = row.value else {
            continue;
        };
        let date = decode_time_value(request.time_type, row.time_value).ok_or_else(|| {
            AppError::fetch(format!(
                "Invalid time_value {} in Epidata response for {}.",
                row.time_value,
                request.describe()
            ))
        })?;
        out.push(ProviderRow {
            time_value: days_since_epoch(date),
            value,
            geo_type: parse_or(row.geo_type.as_deref(), request.geo_type)?,
            geo_value: row.geo_value,
            time_type: parse_or(row.time_type.as_deref(), request.time_type)?,
            key: SignalKey::new(
                row.source.unwrap_or_else(|| request.key.source.clone()),
                row.signal.unwrap_or_else(|| request.key.signal.clone()),
            ),
        });
    }
    Ok(out)
}

/// Native `time_value` to a calendar date (weekly values map to the epi-week's Sunday).
fn decode_time_value(time_type: TimeType, raw: i64) -> Option<NaiveDate> {
    match time_type {
        TimeType::Day => parse_yyyymmdd(raw),
        TimeType::Week => parse_yyyyww(raw),
    }
}

fn parse_or<T: std::str::FromStr<Err = AppError> + Copy>(raw: Option<&str>, fallback: T) -> Result<T, AppError> {
    match raw {
        Some(s) => s
            .parse()
            .map_err(|e: AppError| AppError::fetch(format!("Unexpected value in Epidata response: {e}"))),
        None => Ok(fallback),
    }
}
