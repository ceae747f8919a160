//! Deterministic offline signal provider.
//!
//! Every region gets a handful of epidemic waves derived from the seed and the
//! region code; every signal follows those waves with its own scale and delay,
//! plus multiplicative noise. The same `(seed, signal, region, date)` always
//! yields the same latest value for a given `rand` release; per-stream seeds
//! are derived with FNV-1a so they do not depend on the toolchain.
//!
//! Revisions are simulated for `as_of` requests: dates after `as_of` are not
//! yet reported and recent dates are under-reported, converging to the latest
//! value as the reporting gap grows.

use chrono::{Duration, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::epiweek::{days_since_epoch, parse_yyyymmdd, parse_yyyyww};
use crate::data::provider::{FetchRequest, ProviderRow, SignalProvider};
use crate::domain::TimeType;
use crate::error::AppError;

const WAVES_PER_REGION: usize = 4;
/// Wave centers are spread over 2020-02 .. 2023-06 (days since epoch).
const WAVE_CENTER_RANGE: (f64, f64) = (18_300.0, 19_500.0);
const NOISE_SIGMA: f64 = 0.03;
/// Fraction missing from a value reported on the as-of date itself.
const REVISION_DEFICIT: f64 = 0.35;
/// Days for the under-reporting to decay by a factor of e.
const REVISION_DECAY_DAYS: f64 = 10.0;
/// Signals whose name contains this marker produce no rows (for exercising error paths).
const EMPTY_MARKER: &str = "empty";

#[derive(Debug, Clone, Copy)]
struct Wave {
    center: f64,
    width: f64,
    amplitude: f64,
}

pub struct SyntheticProvider {
    seed: u64,
}

impl SyntheticProvider {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn waves(&self, geo_value: &str) -> Vec<Wave> {
        let mut rng = StdRng::seed_from_u64(stream_seed(self.seed, &[b"waves", geo_value.as_bytes()]));
        (0..WAVES_PER_REGION)
            .map(|_| Wave {
                center: rng.gen_range(WAVE_CENTER_RANGE.0..WAVE_CENTER_RANGE.1),
                width: rng.gen_range(15.0..45.0),
                amplitude: rng.gen_range(0.5..1.5),
            })
            .collect()
    }

    /// `(scale, delay_days)` for a signal.
    fn signal_profile(&self, request: &FetchRequest) -> (f64, f64) {
        let mut rng = StdRng::seed_from_u64(stream_seed(
            self.seed,
            &[b"profile", request.key.source.as_bytes(), request.key.signal.as_bytes()],
        ));
        let scale = 10f64.powf(rng.gen_range(0.0..2.0));
        let delay = rng.gen_range(0..15) as f64;
        (scale, delay)
    }

    fn noise(&self, request: &FetchRequest, day: i64) -> Result<f64, AppError> {
        let normal = Normal::new(0.0, NOISE_SIGMA)
            .map_err(|e| AppError::fetch(format!("Noise distribution error: {e}")))?;
        let mut rng = StdRng::seed_from_u64(stream_seed(
            self.seed,
            &[
                request.key.source.as_bytes(),
                request.key.signal.as_bytes(),
                request.geo_value.as_bytes(),
                &day.to_le_bytes(),
            ],
        ));
        Ok(normal.sample(&mut rng))
    }

    fn dates(request: &FetchRequest) -> Result<Vec<NaiveDate>, AppError> {
        let (decode, step): (fn(i64) -> Option<NaiveDate>, i64) = match request.time_type {
            TimeType::Day => (parse_yyyymmdd, 1),
            TimeType::Week => (parse_yyyyww, 7),
        };
        let start = decode(i64::from(request.range.start));
        let end = decode(i64::from(request.range.end));
        let (Some(start), Some(end)) = (start, end) else {
            return Err(AppError::fetch(format!("Invalid range in {}.", request.describe())));
        };
        let mut out = Vec::new();
        let mut date = start;
        while date <= end {
            out.push(date);
            date += Duration::days(step);
        }
        Ok(out)
    }
}

impl SignalProvider for SyntheticProvider {
    fn fetch_rows(&self, request: &FetchRequest) -> Result<Vec<ProviderRow>, AppError> {
        if request.key.signal.contains(EMPTY_MARKER) {
            return Ok(Vec::new());
        }

        let waves = self.waves(&request.geo_value);
        let (scale, delay) = self.signal_profile(request);

        let mut rows = Vec::new();
        for date in Self::dates(request)? {
            if request.as_of.is_some_and(|as_of| date > as_of) {
                continue;
            }
            let day = days_since_epoch(date);
            let t = day as f64 - delay;
            let level: f64 = 0.05
                + waves
                    .iter()
                    .map(|w| w.amplitude * (-0.5 * ((t - w.center) / w.width).powi(2)).exp())
                    .sum::<f64>();
            let mut value = (scale * level * (1.0 + self.noise(request, day)?)).max(0.0);
            if let Some(as_of) = request.as_of {
                let gap = (as_of - date).num_days() as f64;
                value *= 1.0 - REVISION_DEFICIT * (-gap / REVISION_DECAY_DAYS).exp();
            }
            rows.push(ProviderRow {
                time_value: day,
                value,
                geo_type: request.geo_type,
                geo_value: request.geo_value.clone(),
                time_type: request.time_type,
                key: request.key.clone(),
            });
        }
        Ok(rows)
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over the seed and each part; parts are separated by a 0xff byte.
fn stream_seed(seed: u64, parts: &[&[u8]]) -> u64 {
    let mut hash = FNV_OFFSET;
    let mut feed = |byte: u8| {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    };
    seed.to_le_bytes().into_iter().for_each(&mut feed);
    for part in parts {
        feed(0xff);
        part.iter().copied().for_each(&mut feed);
    }
    hash
}
