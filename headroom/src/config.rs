//! This module controls configuration parsing from the end user, providing a
//! convenience mechanism for the rest of the program. Every setting has a
//! default, so an absent configuration file is not an error.
use std::{
    env, fs, io,
    num::{NonZeroU32, NonZeroU64, NonZeroUsize},
    path::{Path, PathBuf},
    time::Duration,
};

use rustc_hash::FxHashSet;
use serde::Deserialize;
use tracing::debug;

use crate::field_map::FieldMap;

/// Environment variable that may hold the full YAML configuration.
pub const CONFIG_ENV: &str = "HEADROOM_CONFIG";
/// Directory name under `$HOME` used when `data_dir` is not set.
pub const DEFAULT_DATA_DIR: &str = ".mactop-report-data";

/// Fields recorded when `record.fields` is not set, in column order.
pub const DEFAULT_FIELDS: [&str; 9] = [
    "cpu_usage_percent",
    "gpu_usage_percent",
    "memory_total",
    "memory_used",
    "memory_swap_total",
    "memory_swap_used",
    "power_cpu",
    "power_gpu",
    "power_total",
];

/// Metrics analysed when `analysis.metrics` is not set.
pub const DEFAULT_METRICS: [&str; 4] = [
    "cpu_usage_percent",
    "gpu_usage_percent",
    "ram_percent",
    "swap_pressure_percent",
];

/// Errors produced by [`Config`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error for a serde [`serde_yaml`].
    #[error("Failed to deserialize yaml: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    /// Error reading config file
    #[error("Failed to read config file {path:?}: {source}")]
    ReadFile {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },
    /// `record.fields` is empty
    #[error("record.fields must name at least one field")]
    NoFields,
    /// `record.fields` names a field twice, or names the timestamp column
    #[error("record.fields has a duplicate or reserved field: {0}")]
    BadField(String),
    /// `analysis.metrics` is empty
    #[error("analysis.metrics must name at least one metric")]
    NoMetrics,
    /// No `data_dir` configured and `$HOME` is not set
    #[error("data_dir is not set and HOME is unavailable")]
    NoHome,
}

fn default_uri() -> String {
    "http://localhost:8888/metrics".to_string()
}

fn default_sample_period() -> NonZeroU64 {
    NonZeroU64::MIN.saturating_add(999)
}

fn default_batch_size() -> NonZeroUsize {
    NonZeroUsize::MIN.saturating_add(59)
}

fn default_fields() -> Vec<String> {
    DEFAULT_FIELDS.iter().map(ToString::to_string).collect()
}

fn default_metrics() -> Vec<String> {
    DEFAULT_METRICS.iter().map(ToString::to_string).collect()
}

fn default_peak_window() -> NonZeroU32 {
    NonZeroU32::MIN.saturating_add(14)
}

#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
#[serde(deny_unknown_fields)]
/// Settings for the `record` subcommand
pub struct Record {
    /// Endpoint to scrape
    #[serde(default = "default_uri")]
    pub uri: String,
    /// Time between scrapes
    #[serde(default = "default_sample_period")]
    pub sample_period_milliseconds: NonZeroU64,
    /// Samples buffered before a flush to disk
    #[serde(default = "default_batch_size")]
    pub batch_size: NonZeroUsize,
    /// Columns written after the timestamp, in order
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,
}

impl Default for Record {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            sample_period_milliseconds: default_sample_period(),
            batch_size: default_batch_size(),
            fields: default_fields(),
        }
    }
}

impl Record {
    /// The scrape interval as a [`Duration`].
    #[must_use]
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_milliseconds.get())
    }
}

#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
#[serde(deny_unknown_fields)]
/// Settings for the `analyze` subcommand
pub struct Analysis {
    /// Metrics to analyse
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,
    /// Width of the peak-usage window
    #[serde(default = "default_peak_window")]
    pub peak_window_minutes: NonZeroU32,
}

impl Default for Analysis {
    fn default() -> Self {
        Self {
            metrics: default_metrics(),
            peak_window_minutes: default_peak_window(),
        }
    }
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq, Clone)]
#[serde(deny_unknown_fields)]
/// Main configuration struct for this program
pub struct Config {
    /// Recorder settings
    #[serde(default)]
    pub record: Record,
    /// Report settings
    #[serde(default)]
    pub analysis: Analysis,
    /// Where daily capture files live
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Exposed metric to canonical field table
    #[serde(default)]
    pub field_map: FieldMap,
}

impl Config {
    /// Parse and validate YAML `contents`.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed, has unknown keys or
    /// violates a constraint.
    pub fn parse(contents: &str) -> Result<Self, Error> {
        // An empty document deserializes to unit, not an empty map.
        let config: Self = if contents.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Resolve configuration from, in order of preference, `from_env` (the
    /// value of [`CONFIG_ENV`]), the file at `path` if it exists, and the
    /// built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen source cannot be read or parsed.
    pub fn resolve(from_env: Option<String>, path: Option<&Path>) -> Result<Self, Error> {
        if let Some(contents) = from_env {
            debug!("Using config from env var '{CONFIG_ENV}'");
            return Self::parse(&contents);
        }

        let Some(path) = path else {
            debug!("No configuration file given, using defaults");
            return Ok(Self::default());
        };

        match fs::read_to_string(path) {
            Ok(contents) => {
                debug!("Using configuration file at: {}", path.display());
                Self::parse(&contents)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("No configuration file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(Error::ReadFile {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Like [`Config::resolve`], reading [`CONFIG_ENV`] from the process
    /// environment.
    ///
    /// # Errors
    ///
    /// See [`Config::resolve`].
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        Self::resolve(env::var(CONFIG_ENV).ok(), path)
    }

    /// The capture directory: `data_dir` if set, else
    /// `$HOME/.mactop-report-data`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoHome`] if neither is available.
    pub fn data_dir(&self) -> Result<PathBuf, Error> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(DEFAULT_DATA_DIR))
            .ok_or(Error::NoHome)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.record.fields.is_empty() {
            return Err(Error::NoFields);
        }
        let mut seen = FxHashSet::default();
        for field in &self.record.fields {
            if field == headroom_capture::dataset::TIMESTAMP || !seen.insert(field.as_str()) {
                return Err(Error::BadField(field.clone()));
            }
        }
        if self.analysis.metrics.is_empty() {
            return Err(Error::NoMetrics);
        }
        Ok(())
    }
}
