//! Command-line parsing for the signal lag explorer.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fetch, alignment and forecasting code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{
    CorrelationGrouping, CorrelationMethod, ForecasterKind, GeoType, SignalKey, TimeType,
};
use crate::forecast::DEFAULT_LEVEL;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "siglag",
    version,
    about = "Lagged correlation and revision-aware forecast evaluation for epidemiological signals"
)]
pub struct Cli {
    /// Use the deterministic synthetic provider instead of the Epidata API.
    #[arg(long, global = true)]
    pub offline: bool,

    /// Seed for the synthetic provider.
    #[arg(long, global = true, default_value_t = 42)]
    pub seed: u64,

    /// Signal metadata CSV used to negotiate date windows and geo types.
    #[arg(long, global = true, value_name = "CSV")]
    pub metadata: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the known signals (and, with --metadata, where they are published).
    Signals,
    /// Fetch and merge one or more signals, print a preview, optionally export CSV.
    Fetch(FetchArgs),
    /// Correlate two signals at a single lag.
    Correlate(CorrelateArgs),
    /// Correlate two signals over a symmetric range of lags and report the best one.
    Sweep(SweepArgs),
    /// Compare forecasts trained on latest vs as-of data against realized values.
    Forecast(ForecastArgs),
}

/// Geography and date window shared by the data commands.
///
/// Missing dates or time type are taken from the metadata table.
#[derive(Debug, Args, Clone)]
pub struct SelectionArgs {
    /// Geographic granularity.
    #[arg(long, value_enum, default_value_t = GeoType::State)]
    pub geo_type: GeoType,

    /// Region code (e.g. `pa`, `us`, `42003`).
    #[arg(long)]
    pub geo_value: String,

    /// First date of the window (YYYY-MM-DD).
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last date of the window (YYYY-MM-DD).
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Reporting granularity.
    #[arg(long, value_enum)]
    pub time_type: Option<TimeType>,
}

#[derive(Debug, Args, Clone)]
pub struct FetchArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Signal as `source:signal`; repeat for several.
    #[arg(long = "signal", required = true, value_name = "SOURCE:SIGNAL")]
    pub signals: Vec<SignalKey>,

    /// Revision date; omit for the latest revision.
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Rows shown from each end of the table.
    #[arg(long, default_value_t = 5)]
    pub preview: usize,

    /// Export the merged table to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

/// The two signals being compared.
#[derive(Debug, Args, Clone)]
pub struct PairArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Signal that gets shifted (`source:signal`).
    #[arg(long, value_name = "SOURCE:SIGNAL")]
    pub series1: SignalKey,

    /// Reference signal (`source:signal`).
    #[arg(long, value_name = "SOURCE:SIGNAL")]
    pub series2: SignalKey,

    /// Correlation statistic.
    #[arg(long, value_enum, default_value_t = CorrelationMethod::Pearson)]
    pub method: CorrelationMethod,

    /// Grouping key for the correlation.
    #[arg(long, value_enum, default_value_t = CorrelationGrouping::GeoValue)]
    pub group_by: CorrelationGrouping,
}

#[derive(Debug, Args, Clone)]
pub struct CorrelateArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// Lag in native units; negative pairs series1 with later series2 values.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub lag: i32,
}

#[derive(Debug, Args, Clone)]
pub struct SweepArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// Largest |lag| to evaluate; defaults to half the window.
    #[arg(long)]
    pub max_lag: Option<u32>,

    /// Export the sweep to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ForecastArgs {
    /// Geographic granularity.
    #[arg(long, value_enum, default_value_t = GeoType::State)]
    pub geo_type: GeoType,

    /// Region code.
    #[arg(long)]
    pub geo_value: String,

    /// Predictor signal (`source:signal`); repeat for several.
    #[arg(long = "predictor", value_name = "SOURCE:SIGNAL")]
    pub predictors: Vec<SignalKey>,

    /// Signal to forecast (`source:signal`).
    #[arg(long, value_name = "SOURCE:SIGNAL")]
    pub predicted: SignalKey,

    #[arg(long, value_enum, default_value_t = ForecasterKind::Arx)]
    pub forecaster: ForecasterKind,

    /// Days ahead to forecast.
    #[arg(long, default_value_t = 7)]
    pub horizon: u32,

    /// Forecast origin (YYYY-MM-DD); the last day of training data.
    #[arg(long)]
    pub origin: NaiveDate,

    /// First training day (YYYY-MM-DD); defaults to 90 days before the origin.
    #[arg(long)]
    pub training_start: Option<NaiveDate>,

    /// Nominal interval coverage.
    #[arg(long, default_value_t = DEFAULT_LEVEL)]
    pub level: f64,

    /// Export the comparison to JSON.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_sweep_with_global_flags() {
        let cli = Cli::try_parse_from([
            "siglag",
            "sweep",
            "--geo-value",
            "pa",
            "--series1",
            "jhu-csse:confirmed_7dav_incidence_prop",
            "--series2",
            "jhu-csse:deaths_7dav_incidence_prop",
            "--method",
            "spearman",
            "--offline",
            "--start",
            "2021-01-01",
        ])
        .unwrap();

        assert!(cli.offline);
        let Command::Sweep(args) = cli.command else {
            panic!("expected sweep");
        };
        assert_eq!(args.pair.method, CorrelationMethod::Spearman);
        assert_eq!(args.pair.selection.geo_type, GeoType::State);
        assert_eq!(args.pair.series1.signal, "confirmed_7dav_incidence_prop");
        assert_eq!(args.pair.selection.start, NaiveDate::from_ymd_opt(2021, 1, 1));
        assert_eq!(args.max_lag, None);
    }

    #[test]
    fn negative_lag_and_repeated_predictors() {
        let cli = Cli::try_parse_from([
            "siglag",
            "correlate",
            "--geo-value",
            "us",
            "--geo-type",
            "nation",
            "--series1",
            "a:b",
            "--series2",
            "c:d",
            "--lag",
            "-10",
        ])
        .unwrap();
        let Command::Correlate(args) = cli.command else {
            panic!("expected correlate");
        };
        assert_eq!(args.lag, -10);

        let cli = Cli::try_parse_from([
            "siglag",
            "forecast",
            "--geo-value",
            "ca",
            "--predictor",
            "a:b",
            "--predictor",
            "c:d",
            "--predicted",
            "c:d",
            "--origin",
            "2021-12-01",
        ])
        .unwrap();
        let Command::Forecast(args) = cli.command else {
            panic!("expected forecast");
        };
        assert_eq!(args.predictors.len(), 2);
        assert_eq!(args.horizon, 7);
        assert_eq!(args.forecaster, ForecasterKind::Arx);
    }

    #[test]
    fn only_geo_grouping_is_accepted() {
        let args = |group: &'static str| {
            [
                "siglag", "correlate", "--geo-value", "pa", "--series1", "a:b", "--series2", "c:d", "--group-by",
                group,
            ]
        };
        let cli = Cli::try_parse_from(args("geo-value")).unwrap();
        let Command::Correlate(parsed) = cli.command else {
            panic!("expected correlate");
        };
        assert_eq!(parsed.pair.group_by, CorrelationGrouping::GeoValue);
        assert!(Cli::try_parse_from(args("time-value")).is_err());
    }

    #[test]
    fn malformed_signal_key_is_rejected() {
        assert!(
            Cli::try_parse_from(["siglag", "fetch", "--geo-value", "pa", "--signal", "nocolon"]).is_err()
        );
    }
}
