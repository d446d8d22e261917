//! Capacity analysis over captured days
//!
//! [`run_analysis`] is the single entry point: it finds the capture files for
//! a date range, loads them into one [`Dataset`], adds the derived memory
//! metrics and computes statistics, peak windows, heatmaps and sufficiency
//! scores. Everything here is synchronous and owns no state between calls.

pub mod derived;
pub mod heatmap;
pub mod peak;
pub mod stats;
pub mod sufficiency;

use std::collections::BTreeMap;
use std::{io, path::PathBuf};

use chrono::{NaiveDate, TimeDelta};
use headroom_capture::{
    daily::{self, DateRange},
    dataset::Dataset,
    load,
};
use tracing::{debug, info, warn};

use self::{heatmap::Heatmap, peak::PeakWindow, stats::Statistics};

#[derive(Debug, thiserror::Error)]
/// Errors produced by [`run_analysis`]
pub enum Error {
    /// No capture file matched the request, or none of them held data.
    #[error("no data available: {reason}")]
    NoData {
        /// What was looked for
        reason: String,
    },
    /// The data directory could not be listed.
    #[error("failed to list capture files: {0}")]
    Discover(#[from] daily::Error),
}

impl Error {
    /// Whether this is the "nothing to report" case rather than a failure.
    #[must_use]
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Where to read captures from.
pub enum Source {
    /// A directory of daily files, filtered by date range
    Directory(PathBuf),
    /// One capture file, read whatever its name
    File(PathBuf),
}

#[derive(Debug, Clone)]
/// Knobs for [`run_analysis`].
pub struct Options {
    /// Metrics to report on
    pub metrics: Vec<String>,
    /// Peak window width
    pub peak_window: TimeDelta,
    /// Inclusive date range. For a directory, unbounded on both ends means
    /// `today` only. A single file is filtered by its samples' dates and an
    /// unbounded range keeps every row.
    pub range: DateRange,
    /// The local date, used when `range` is unbounded
    pub today: NaiveDate,
}

impl Options {
    /// Options for `metrics` over `range` with the default peak window.
    #[must_use]
    pub fn new(metrics: Vec<String>, range: DateRange, today: NaiveDate) -> Self {
        Self {
            metrics,
            peak_window: TimeDelta::minutes(i64::from(peak::DEFAULT_WINDOW_MINUTES)),
            range,
            today,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Facts about the analysed dataset.
pub struct Summary {
    /// Samples in the dataset
    pub total_records: usize,
    /// Date of the first sample
    pub first_date: Option<NaiveDate>,
    /// Date of the last sample
    pub last_date: Option<NaiveDate>,
    /// Metrics that were analysed, in request order
    pub metrics: Vec<String>,
    /// Raw inputs of derived metrics that also got statistics, in the order
    /// their metrics were requested
    pub inputs: Vec<String>,
    /// Files that were read
    pub files: Vec<PathBuf>,
    /// Files that were excluded, with the reason
    pub rejected: Vec<(String, String)>,
}

impl Summary {
    /// Every metric with statistics: the analysed metrics in request order,
    /// then the raw inputs.
    pub fn reported(&self) -> impl Iterator<Item = &str> {
        self.metrics.iter().chain(&self.inputs).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Everything the dashboard shows.
pub struct Analysis {
    /// Statistics for the analysed metrics and, when a derived metric was
    /// requested, its raw inputs
    pub statistics: BTreeMap<String, Statistics>,
    /// One heatmap per analysed metric
    pub heatmaps: BTreeMap<String, Heatmap>,
    /// Sufficiency score per entry of `statistics`
    pub sufficiency: BTreeMap<String, f64>,
    /// Peak window per analysed metric
    pub peaks: BTreeMap<String, PeakWindow>,
    /// Dataset facts
    pub summary: Summary,
}

/// Load captures from `source` and analyse them.
///
/// # Errors
///
/// Returns [`Error::NoData`] when the directory does not exist, no file
/// matches, or no file holds usable data in range, and [`Error::Discover`]
/// when an existing directory cannot be listed.
pub fn run_analysis(source: &Source, options: &Options) -> Result<Analysis, Error> {
    let files = match source {
        Source::File(path) => vec![path.clone()],
        Source::Directory(dir) => {
            let range = options.range.or_today(options.today);
            let files = match daily::discover(dir, range) {
                Ok(files) => files,
                Err(daily::Error::Io { err, .. }) if err.kind() == io::ErrorKind::NotFound => {
                    debug!("{dir} does not exist", dir = dir.display());
                    Vec::new()
                }
                Err(e) => return Err(e.into()),
            };
            if files.is_empty() {
                return Err(Error::NoData {
                    reason: format!("no capture files in {} for {range}", dir.display()),
                });
            }
            files
        }
    };
    info!("Analysing {} capture file(s)", files.len());

    let mut loaded = load::load_files(&files).map_err(|e| Error::NoData {
        reason: e.to_string(),
    })?;
    if let Source::File(_) = source {
        let range = options.range;
        loaded.dataset.retain(|s| range.contains(s.timestamp.date()));
    }
    if loaded.dataset.is_empty() {
        return Err(Error::NoData {
            reason: format!("{} holds no samples", describe(&files)),
        });
    }

    let rejected = loaded
        .rejected
        .into_iter()
        .map(|r| (r.origin, r.reason.to_string()))
        .collect();
    let mut analysis = analyze(loaded.dataset, options);
    analysis.summary.files = files;
    analysis.summary.rejected = rejected;
    Ok(analysis)
}

/// Analyse an already loaded dataset.
#[must_use]
pub fn analyze(mut dataset: Dataset, options: &Options) -> Analysis {
    let wants_derived = options.metrics.iter().any(|m| derived::is_derived(m));
    if wants_derived {
        derived::add_derived_metrics(&mut dataset);
    }

    let mut targets: Vec<String> = Vec::new();
    for metric in &options.metrics {
        if !dataset.has_column(metric) {
            warn!("Metric {metric} not found in data, skipping");
        } else if !targets.contains(metric) {
            targets.push(metric.clone());
        }
    }

    let mut statistics = BTreeMap::new();
    let mut heatmaps = BTreeMap::new();
    let mut peaks = BTreeMap::new();
    for metric in &targets {
        debug!("Analysing {metric}");
        statistics.insert(metric.clone(), stats::calculate(&dataset, metric));
        heatmaps.insert(metric.clone(), heatmap::aggregate(&dataset, metric));
        peaks.insert(
            metric.clone(),
            peak::find_peak_window(&dataset.points(metric), options.peak_window),
        );
    }

    let mut inputs = Vec::new();
    for input in targets.iter().flat_map(|m| derived::inputs_of(m)) {
        if statistics.contains_key(*input) {
            continue;
        }
        if dataset.has_column(input) {
            statistics.insert((*input).to_string(), stats::calculate(&dataset, input));
            inputs.push((*input).to_string());
        } else {
            warn!("Metric {input} not found in data, skipping");
        }
    }

    let sufficiency = sufficiency::scores(&statistics);
    let range = dataset.time_range();

    Analysis {
        statistics,
        heatmaps,
        sufficiency,
        peaks,
        summary: Summary {
            total_records: dataset.len(),
            first_date: range.map(|(first, _)| first.date()),
            last_date: range.map(|(_, last)| last.date()),
            metrics: targets,
            inputs,
            files: Vec::new(),
            rejected: Vec::new(),
        },
    }
}

fn describe(files: &[PathBuf]) -> String {
    match files {
        [one] => one.display().to_string(),
        _ => format!("{} capture files", files.len()),
    }
}
