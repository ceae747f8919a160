//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - signal identity and geography (`SignalKey`, `GeoType`, `TimeType`)
//! - fetched observations (`SignalSeries`)
//! - correlation and lag-sweep outputs (`Correlation`, `LagSweepResult`)
//! - forecast outputs (`ForecastResult`, `ForecastPoint`)

pub mod types;

pub use types::*;
