//! Record `mactop` metrics and report on resource headroom.

#![allow(clippy::print_stdout)]

use std::{
    num::{NonZeroU32, NonZeroU64, NonZeroUsize},
    path::PathBuf,
    time::Duration,
};

use chrono::{Local, NaiveDate, TimeDelta};
use clap::{Args, Parser, Subcommand};
use headroom::{
    analysis::{self, Options, Source},
    config::{self, Config},
    report::{self, Dashboard},
    target_metrics::prometheus::{self, Prometheus},
};
use headroom_capture::{
    buffer::Buffer,
    daily::{self, DailySink, DateRange},
    load::{self, Batch},
    validate::{ValidationResult, validate_batch},
};
use tokio::{runtime::Builder, signal};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] config::Error),
    #[error("Capture directory error: {0}")]
    Capture(#[from] daily::Error),
    #[error("Recorder error: {0}")]
    Recorder(#[from] prometheus::Error),
    #[error("Analysis error: {0}")]
    Analysis(#[from] analysis::Error),
    #[error("Failed to read capture: {0}")]
    Load(#[from] load::Error),
    #[error("Capture file failed validation")]
    Invalid,
    #[error("Failed to render report: {0}")]
    Render(#[from] std::fmt::Error),
}

#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
struct Cli {
    /// path on disk to the configuration file, ignored when HEADROOM_CONFIG is set
    #[clap(long, global = true)]
    config_path: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scrape the metrics endpoint and append samples to daily capture files
    Record(RecordArgs),
    /// Analyse captured days and print the dashboard
    Analyze(AnalyzeArgs),
    /// Validate that a capture file is well-formed
    Validate(ValidateArgs),
    /// Validate configuration and exit
    ConfigCheck,
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// metrics endpoint to scrape
    #[clap(long)]
    uri: Option<String>,
    /// milliseconds between scrapes
    #[clap(long)]
    interval_ms: Option<NonZeroU64>,
    /// samples buffered before each write to disk
    #[clap(long)]
    batch_size: Option<NonZeroUsize>,
    /// directory holding the daily capture files
    #[clap(long)]
    data_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// first date to include, YYYY-MM-DD
    #[clap(long)]
    start_date: Option<NaiveDate>,
    /// last date to include, YYYY-MM-DD
    #[clap(long)]
    end_date: Option<NaiveDate>,
    /// directory holding the daily capture files
    #[clap(long, conflicts_with = "file")]
    data_dir: Option<PathBuf>,
    /// analyse this one capture file instead of a directory
    #[clap(long)]
    file: Option<PathBuf>,
    /// comma separated metrics to analyse
    #[clap(long, value_delimiter = ',')]
    metrics: Vec<String>,
    /// width of the peak usage window in minutes
    #[clap(long)]
    window_minutes: Option<NonZeroU32>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// path to a capture CSV file
    capture_path: PathBuf,
    /// minimum number of rows the capture must hold
    #[clap(long)]
    min_rows: Option<u64>,
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .finish()
        .init();

    let cli = Cli::parse();
    debug!("{cli:?}");

    match cli.command {
        Commands::ConfigCheck => match Config::load(cli.config_path.as_deref()) {
            Ok(_) => {
                info!("Configuration is valid");
                std::process::exit(0)
            }
            Err(e) => {
                error!("Configuration validation failed: {e}");
                std::process::exit(1)
            }
        },
        Commands::Validate(args) => validate(&args),
        Commands::Record(args) => record(Config::load(cli.config_path.as_deref())?, args),
        Commands::Analyze(args) => analyze(&Config::load(cli.config_path.as_deref())?, args),
    }
}

fn record(config: Config, args: RecordArgs) -> Result<(), Error> {
    let uri = args.uri.unwrap_or_else(|| config.record.uri.clone());
    let sample_period = args
        .interval_ms
        .map_or_else(|| config.record.sample_period(), |ms| Duration::from_millis(ms.get()));
    let batch_size = args.batch_size.unwrap_or(config.record.batch_size);
    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => config.data_dir()?,
    };

    let version = env!("CARGO_PKG_VERSION");
    info!("Starting headroom {version} recorder.");

    let mut sink = DailySink::new(data_dir, config.record.fields)?;
    let mut buffer = Buffer::new(batch_size);
    let recorder = Prometheus::new(uri, config.field_map, sample_period);

    let runtime = Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()?;
    runtime.block_on(recorder.run(&mut buffer, &mut sink, async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {e}");
        }
    }))?;

    if buffer.dropped() > 0 {
        info!("{dropped} samples were dropped while flushes failed", dropped = buffer.dropped());
    }
    info!("Recorder stopped.");
    Ok(())
}

fn analyze(config: &Config, args: AnalyzeArgs) -> Result<(), Error> {
    let source = match (args.file, args.data_dir) {
        (Some(file), _) => Source::File(file),
        (None, Some(dir)) => Source::Directory(dir),
        (None, None) => Source::Directory(config.data_dir()?),
    };
    let metrics = if args.metrics.is_empty() {
        config.analysis.metrics.clone()
    } else {
        args.metrics
    };
    let window = args
        .window_minutes
        .unwrap_or(config.analysis.peak_window_minutes);

    let mut options = Options::new(
        metrics,
        DateRange {
            start: args.start_date,
            end: args.end_date,
        },
        Local::now().date_naive(),
    );
    options.peak_window = TimeDelta::minutes(i64::from(window.get()));

    let mut out = String::new();
    match analysis::run_analysis(&source, &options) {
        Ok(analysis) => Dashboard::new(&analysis, options.peak_window).render(&mut out)?,
        Err(e) if e.is_no_data() => report::render_error(&mut out, &e)?,
        Err(e) => {
            error!("Analysis failed: {e}");
            return Err(e.into());
        }
    }
    print!("{out}");
    Ok(())
}

fn validate(args: &ValidateArgs) -> Result<(), Error> {
    let path = &args.capture_path;
    if !path.exists() {
        error!("Capture file {} does not exist", path.display());
        return Err(Error::Invalid);
    }

    let batch = Batch::read(path).map_err(|e| {
        error!("Failed to read capture file: {e}");
        e
    })?;
    let result = validate_batch(&batch, args.min_rows);
    report_validation_result(&result)
}

fn report_validation_result(result: &ValidationResult) -> Result<(), Error> {
    info!("Validated {rows} rows", rows = result.row_count);
    info!("  Columns: {columns}", columns = result.column_count);
    if let Some((first, last)) = result.time_range {
        info!("  Time range: {first} to {last}");
    }

    if let Some((row, category, msg)) = &result.first_error {
        error!(
            "Found {ts} timestamp, {ord} ordering, {width} width and {min} minimum row violations",
            ts = result.timestamp_errors,
            ord = result.ordering_errors,
            width = result.width_errors,
            min = result.min_rows_errors,
        );
        error!("First violation at row {row}: {category}");
        error!("  {msg}");
    }

    if result.is_valid() {
        println!("Capture file is valid: {} rows", result.row_count);
        Ok(())
    } else {
        println!("Capture file is invalid");
        Err(Error::Invalid)
    }
}
