//! `signal-lag` library crate.
//!
//! The binary (`siglag`) is a thin wrapper around this library so that:
//!
//! - the alignment, lag search and forecast harness are testable without
//!   spawning processes or touching the network
//! - providers and engines can be swapped behind their traits
//!
//! Pipeline: fetch (`data`) -> align (`merge`) -> lag search (`lag`) or
//! forecast evaluation (`forecast`) -> `report` / `io` exports.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod io;
pub mod lag;
pub mod math;
pub mod merge;
pub mod report;
