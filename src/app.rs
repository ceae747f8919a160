//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - initializes logging
//! - parses CLI arguments
//! - picks the signal provider (Epidata over HTTP, or synthetic offline)
//! - runs the command pipeline
//! - prints reports and writes optional exports

use clap::Parser;

use crate::cli::{Cli, Command, CorrelateArgs, FetchArgs, ForecastArgs, SweepArgs};
use crate::data::{CachedProvider, EpidataClient, SignalMetadata, SignalProvider, SyntheticProvider};
use crate::error::AppError;
use crate::lag::{LogProgress, SweepControl};

pub mod pipeline;

/// Entry point for the `siglag` binary.
pub fn run() -> Result<(), AppError> {
    init_logging();
    let cli = Cli::parse();

    let metadata = cli
        .metadata
        .as_deref()
        .map(SignalMetadata::load)
        .transpose()?;
    if let Some(meta) = &metadata {
        log::info!("loaded {} metadata row(s)", meta.rows().len());
    }

    let (offline, seed) = (cli.offline, cli.seed);
    let provider = || build_provider(offline, seed);

    match cli.command {
        Command::Signals => {
            print!("{}", crate::report::format_catalog(metadata.as_ref()));
            Ok(())
        }
        Command::Fetch(args) => handle_fetch(&provider()?, &args, metadata.as_ref()),
        Command::Correlate(args) => handle_correlate(&provider()?, &args, metadata.as_ref()),
        Command::Sweep(args) => handle_sweep(&provider()?, &args, metadata.as_ref()),
        Command::Forecast(args) => handle_forecast(&provider()?, &args, metadata.as_ref()),
    }
}

/// `RUST_LOG` wins; otherwise `info` to stderr so reports on stdout stay clean.
fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .try_init();
}

/// Provider for this run, wrapped in a request cache.
fn build_provider(offline: bool, seed: u64) -> Result<CachedProvider<Box<dyn SignalProvider>>, AppError> {
    let inner: Box<dyn SignalProvider> = if offline {
        log::info!("using the synthetic provider (seed {seed})");
        Box::new(SyntheticProvider::new(seed))
    } else {
        Box::new(EpidataClient::from_env()?)
    };
    Ok(CachedProvider::new(inner))
}

fn handle_fetch<P: SignalProvider>(
    provider: &P,
    args: &FetchArgs,
    metadata: Option<&SignalMetadata>,
) -> Result<(), AppError> {
    let table = pipeline::run_fetch(provider, args, metadata)?;
    println!("{}", crate::report::format_table_summary(&table, args.preview));

    if let Some(path) = &args.export {
        crate::io::export::write_merged_csv(path, &table)?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}

fn handle_correlate<P: SignalProvider>(
    provider: &P,
    args: &CorrelateArgs,
    metadata: Option<&SignalMetadata>,
) -> Result<(), AppError> {
    let pair = pipeline::fetch_pair(provider, &args.pair, metadata)?;
    let cor = pipeline::run_correlate(&pair, &args.pair, args.lag)?;
    println!(
        "{}",
        crate::report::format_correlation(
            &args.pair.series1,
            &args.pair.series2,
            args.lag,
            pair.window.time_type,
            args.pair.method,
            &cor,
        )
    );
    Ok(())
}

fn handle_sweep<P: SignalProvider>(
    provider: &P,
    args: &SweepArgs,
    metadata: Option<&SignalMetadata>,
) -> Result<(), AppError> {
    let pair = pipeline::fetch_pair(provider, &args.pair, metadata)?;

    let mut progress = LogProgress::new("lag sweep");
    let mut control = SweepControl::new(&mut progress);
    let output = pipeline::run_sweep(&pair, &args.pair, args.max_lag, &mut control)?;

    let best = output.best.as_ref().ok().copied();
    println!(
        "{}",
        crate::report::format_sweep(&args.pair.series1, &args.pair.series2, &output.result, best)
    );

    if let Some(path) = &args.export {
        crate::io::export::write_sweep_csv(path, &output.result)?;
        log::info!("wrote {}", path.display());
    }

    // The table is still worth printing when no lag is defined; the exit code
    // reports the degenerate sweep.
    output.best.map(|_| ())
}

fn handle_forecast<P: SignalProvider>(
    provider: &P,
    args: &ForecastArgs,
    metadata: Option<&SignalMetadata>,
) -> Result<(), AppError> {
    let spec = pipeline::forecast_spec_from_args(args, metadata)?;
    let comparison = pipeline::run_forecast(provider, &spec)?;
    println!("{}", crate::report::format_forecast(&comparison));

    if let Some(path) = &args.export {
        crate::io::export::write_forecast_json(path, &comparison)?;
        log::info!("wrote {}", path.display());
    }

    // Exit non-zero only when neither run produced a forecast.
    match (&comparison.latest.result, &comparison.as_of.result) {
        (Err(e), Err(_)) => Err(e.clone()),
        _ => Ok(()),
    }
}
