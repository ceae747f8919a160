//! Signal acquisition.
//!
//! - provider contract and request cache (`provider`)
//! - HTTP provider for Delphi Epidata (`epidata`)
//! - deterministic offline provider (`synthetic`)
//! - fetch adapter: native ranges, normalization, multi-signal fetch (`fetch`)
//! - metadata negotiation and the signal catalog (`metadata`, `catalog`)

pub mod catalog;
pub mod epidata;
pub mod epiweek;
pub mod fetch;
pub mod metadata;
pub mod provider;
pub mod synthetic;

pub use epidata::EpidataClient;
pub use fetch::{SignalQuery, fetch, fetch_multi};
pub use metadata::{SharedWindow, SignalMetadata, default_max_lag};
pub use provider::{CachedProvider, FetchRequest, ProviderRow, SignalProvider};
pub use synthetic::SyntheticProvider;
