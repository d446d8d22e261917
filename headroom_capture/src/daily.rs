//! Daily capture files
//!
//! Captures rotate by calendar day: every sample lands in the file named for
//! the date of its own timestamp. This module names those files, discovers
//! them again for a date range, and appends flushed samples to them.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::{buffer::Buffer, dataset::TIMESTAMP, writer};

/// Prefix of every daily capture file name.
pub const FILE_PREFIX: &str = "mactop_data_";
/// Extension of every daily capture file.
pub const FILE_EXTENSION: &str = "csv";

/// Errors produced by [`DailySink`] and [`discover`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error reading or creating a capture file or directory.
    #[error("[{context}] Io error: {err}")]
    Io {
        /// The context for the error, simple tag
        context: &'static str,
        /// The underlying error
        err: io::Error,
    },
    /// Error writing rows.
    #[error(transparent)]
    Writer(#[from] writer::Error),
    /// An existing capture file has a header rows cannot be appended under.
    #[error("cannot append to {path}: {reason}")]
    Header {
        /// The capture file
        path: PathBuf,
        /// What is wrong with its header
        reason: String,
    },
}

/// File name for `date`, for example `mactop_data_2025-03-10.csv`.
#[must_use]
pub fn file_name(date: NaiveDate) -> String {
    format!("{FILE_PREFIX}{}.{FILE_EXTENSION}", date.format("%Y-%m-%d"))
}

/// The date embedded in a daily capture file name, if `path` is one.
#[must_use]
pub fn date_of(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let date = name
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_EXTENSION)?
        .strip_suffix('.')?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// An inclusive date range. A missing bound is open.
pub struct DateRange {
    /// First included date.
    pub start: Option<NaiveDate>,
    /// Last included date.
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// The range covering only `date`.
    #[must_use]
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: Some(date),
            end: Some(date),
        }
    }

    /// Resolve an unbounded range to `today` alone. A range with either
    /// bound set is returned unchanged.
    #[must_use]
    pub fn or_today(self, today: NaiveDate) -> Self {
        if self.start.is_none() && self.end.is_none() {
            Self::day(today)
        } else {
            self
        }
    }

    /// Whether `date` falls in this range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (Some(s), Some(e)) if s == e => write!(f, "{s}"),
            (Some(s), Some(e)) => write!(f, "{s} to {e}"),
            (Some(s), None) => write!(f, "{s} onward"),
            (None, Some(e)) => write!(f, "up to {e}"),
            (None, None) => f.write_str("all dates"),
        }
    }
}

/// Find daily capture files in `dir` whose date is inside `range`, sorted by
/// date.
///
/// # Errors
///
/// Returns an error if `dir` cannot be listed.
pub fn discover(dir: &Path, range: DateRange) -> Result<Vec<PathBuf>, Error> {
    let entries = fs::read_dir(dir).map_err(|err| Error::Io {
        context: "read_dir",
        err,
    })?;
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| Error::Io {
            context: "dir_entry",
            err,
        })?;
        let path = entry.path();
        if let Some(date) = date_of(&path) {
            if range.contains(date) {
                found.push((date, path));
            }
        }
    }
    found.sort();
    Ok(found.into_iter().map(|(_, p)| p).collect())
}

#[derive(Debug)]
/// Appends flushed samples to the daily file of each sample's date.
pub struct DailySink {
    dir: PathBuf,
    fields: Vec<String>,
}

impl DailySink {
    /// Create a sink writing into `dir` with column order `fields` after the
    /// timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` does not exist and cannot be created.
    pub fn new(dir: PathBuf, fields: Vec<String>) -> Result<Self, Error> {
        fs::create_dir_all(&dir).map_err(|err| Error::Io {
            context: "create_dir",
            err,
        })?;
        Ok(Self { dir, fields })
    }

    /// Directory the sink writes into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write every pending sample in `buffer` and remove it from the buffer.
    /// A file that is new or empty gets a header row first. A file that
    /// already has a header keeps it, and rows are written in its column
    /// order.
    ///
    /// Samples are removed day by day as each file is flushed, so on error
    /// only the samples not yet on disk stay in the buffer for a retry.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be opened or written, or an existing
    /// file has no usable header.
    pub fn flush(&mut self, buffer: &mut Buffer) -> Result<usize, Error> {
        let mut durable = 0;
        let result = self.write_pending(buffer, &mut durable);
        buffer.consume(durable);
        result?;
        debug!("Flushed {durable} samples to {dir}", dir = self.dir.display());
        Ok(durable)
    }

    /// Write `buffer` in order, advancing `durable` past each run of samples
    /// whose file has been flushed.
    fn write_pending(&self, buffer: &Buffer, durable: &mut usize) -> Result<(), Error> {
        let mut written = 0;
        let mut current: Option<(NaiveDate, writer::Writer<io::BufWriter<fs::File>>)> = None;

        for sample in buffer.pending() {
            let date = sample.timestamp.date();
            let rotate = current.as_ref().is_none_or(|(d, _)| *d != date);
            if rotate {
                if let Some((_, mut w)) = current.take() {
                    w.flush()?;
                    *durable = written;
                }
                current = Some((date, self.open(date)?));
            }
            if let Some((_, w)) = current.as_mut() {
                w.write_sample(sample)?;
                written += 1;
            }
        }
        if let Some((_, mut w)) = current.take() {
            w.flush()?;
            *durable = written;
        }
        Ok(())
    }

    fn open(&self, date: NaiveDate) -> Result<writer::Writer<io::BufWriter<fs::File>>, Error> {
        let path = self.dir.join(file_name(date));
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| Error::Io {
                context: "open",
                err,
            })?;
        let len = file
            .metadata()
            .map_err(|err| Error::Io {
                context: "metadata",
                err,
            })?
            .len();
        if len == 0 {
            info!("Starting capture file {path}", path = path.display());
            let mut w = writer::Writer::new(io::BufWriter::new(file), self.fields.clone());
            w.write_header()?;
            return Ok(w);
        }

        let fields = existing_fields(&path)?;
        for missing in self.fields.iter().filter(|f| !fields.contains(f)) {
            warn!(
                "{path} has no {missing} column, the field will not be recorded there",
                path = path.display()
            );
        }
        Ok(writer::Writer::new(io::BufWriter::new(file), fields))
    }
}

/// The columns after the timestamp in the header of the capture file at
/// `path`.
fn existing_fields(path: &Path) -> Result<Vec<String>, Error> {
    let unusable = |reason: String| Error::Header {
        path: path.to_path_buf(),
        reason,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| unusable(e.to_string()))?;
    let header = reader.headers().map_err(|e| unusable(e.to_string()))?;
    match header.get(0) {
        Some(TIMESTAMP) => Ok(header.iter().skip(1).map(String::from).collect()),
        _ => Err(unusable(format!("first column is not {TIMESTAMP}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load;
    use crate::sample::Sample;
    use std::num::NonZeroUsize;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn file_names_round_trip_dates() {
        let name = file_name(date(10));
        assert_eq!(name, "mactop_data_2025-03-10.csv");
        assert_eq!(date_of(Path::new(&name)), Some(date(10)));
        assert_eq!(date_of(Path::new("mactop_data_2025-03-10.json")), None);
        assert_eq!(date_of(Path::new("mactop_data_latest.csv")), None);
        assert_eq!(date_of(Path::new("other_2025-03-10.csv")), None);
    }

    #[test]
    fn range_bounds() {
        let range = DateRange {
            start: Some(date(5)),
            end: None,
        };
        assert!(!range.contains(date(4)));
        assert!(range.contains(date(5)));
        assert!(range.contains(date(30)));
        assert!(DateRange::default().contains(date(1)));
        assert_eq!(DateRange::default().or_today(date(7)), DateRange::day(date(7)));
        assert_eq!(range.or_today(date(7)), range);
    }

    #[test]
    fn range_display() {
        assert_eq!(DateRange::day(date(7)).to_string(), "2025-03-07");
        let open = DateRange {
            start: Some(date(5)),
            end: None,
        };
        assert_eq!(open.to_string(), "2025-03-05 onward");
        assert_eq!(DateRange::default().to_string(), "all dates");
    }

    #[test]
    fn discover_filters_by_range() {
        let dir = tempfile::tempdir().unwrap();
        for d in [3, 1, 2, 9] {
            fs::write(dir.path().join(file_name(date(d))), "timestamp\n").unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found = discover(
            dir.path(),
            DateRange {
                start: Some(date(2)),
                end: Some(date(3)),
            },
        )
        .unwrap();
        let dates: Vec<_> = found.iter().filter_map(|p| date_of(p)).collect();
        assert_eq!(dates, vec![date(2), date(3)]);
    }

    #[test]
    fn flush_rotates_by_sample_date_and_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let fields = vec!["cpu_usage_percent".to_string()];
        let mut sink = DailySink::new(dir.path().join("data"), fields).unwrap();
        let mut buffer = Buffer::new(NonZeroUsize::new(10).unwrap());

        let late = date(10).and_hms_opt(23, 59, 59).unwrap();
        let early = date(11).and_hms_opt(0, 0, 1).unwrap();
        buffer.push(Sample::from_values(late, [("cpu_usage_percent", 1.0)]));
        buffer.push(Sample::from_values(early, [("cpu_usage_percent", 2.0)]));
        assert_eq!(sink.flush(&mut buffer).unwrap(), 2);
        assert!(buffer.is_empty());

        buffer.push(Sample::from_values(early, [("cpu_usage_percent", 3.0)]));
        assert_eq!(sink.flush(&mut buffer).unwrap(), 1);

        let day_one = fs::read_to_string(sink.dir().join(file_name(date(10)))).unwrap();
        let day_two = fs::read_to_string(sink.dir().join(file_name(date(11)))).unwrap();
        assert_eq!(day_one.lines().count(), 2);
        assert_eq!(day_two.lines().count(), 3);
        assert_eq!(day_two.matches("timestamp").count(), 1);

        let files = discover(sink.dir(), DateRange::default()).unwrap();
        let loaded = load::load_files(&files).unwrap();
        let values: Vec<f64> = loaded.dataset.values("cpu_usage_percent").collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn failed_flush_keeps_only_unwritten_days() {
        let dir = tempfile::tempdir().unwrap();
        let fields = vec!["cpu_usage_percent".to_string()];
        let mut sink = DailySink::new(dir.path().to_path_buf(), fields).unwrap();
        let mut buffer = Buffer::new(NonZeroUsize::new(10).unwrap());

        buffer.push(Sample::from_values(
            date(10).and_hms_opt(23, 0, 0).unwrap(),
            [("cpu_usage_percent", 1.0)],
        ));
        buffer.push(Sample::from_values(
            date(11).and_hms_opt(1, 0, 0).unwrap(),
            [("cpu_usage_percent", 2.0)],
        ));

        // a directory where the second day's file belongs cannot be opened
        let blocked = sink.dir().join(file_name(date(11)));
        fs::create_dir(&blocked).unwrap();
        assert!(sink.flush(&mut buffer).is_err());
        assert_eq!(buffer.len(), 1);

        fs::remove_dir(&blocked).unwrap();
        assert_eq!(sink.flush(&mut buffer).unwrap(), 1);
        assert!(buffer.is_empty());

        let files = discover(sink.dir(), DateRange::default()).unwrap();
        let loaded = load::load_files(&files).unwrap();
        let values: Vec<f64> = loaded.dataset.values("cpu_usage_percent").collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn appends_follow_the_existing_header() {
        let dir = tempfile::tempdir().unwrap();
        let mut buffer = Buffer::new(NonZeroUsize::new(10).unwrap());
        let first = date(10).and_hms_opt(8, 0, 0).unwrap();
        let second = date(10).and_hms_opt(9, 0, 0).unwrap();

        let fields = vec!["a".to_string(), "b".to_string()];
        let mut sink = DailySink::new(dir.path().to_path_buf(), fields).unwrap();
        buffer.push(Sample::from_values(first, [("a", 1.0), ("b", 2.0)]));
        sink.flush(&mut buffer).unwrap();

        // a later run on the same day with different fields
        let fields = vec!["b".to_string(), "c".to_string()];
        let mut sink = DailySink::new(dir.path().to_path_buf(), fields).unwrap();
        buffer.push(Sample::from_values(second, [("b", 3.0), ("c", 4.0)]));
        sink.flush(&mut buffer).unwrap();

        let body = fs::read_to_string(sink.dir().join(file_name(date(10)))).unwrap();
        assert_eq!(body.lines().next(), Some("timestamp,a,b"));

        let files = discover(sink.dir(), DateRange::default()).unwrap();
        let loaded = load::load_files(&files).unwrap();
        assert!(loaded.rejected.is_empty());
        assert_eq!(loaded.dataset.len(), 2);
        assert_eq!(loaded.dataset.values("a").collect::<Vec<_>>(), vec![1.0]);
        assert_eq!(loaded.dataset.values("b").collect::<Vec<_>>(), vec![2.0, 3.0]);
        assert!(!loaded.dataset.has_column("c"));
    }

    #[test]
    fn refuses_files_without_a_timestamp_column() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(file_name(date(10))), "cpu,gpu\n1,2\n").unwrap();
        let mut sink = DailySink::new(dir.path().to_path_buf(), vec!["cpu".to_string()]).unwrap();
        let mut buffer = Buffer::new(NonZeroUsize::new(10).unwrap());
        buffer.push(Sample::from_values(
            date(10).and_hms_opt(8, 0, 0).unwrap(),
            [("cpu", 1.0)],
        ));

        let err = sink.flush(&mut buffer).unwrap_err();
        assert!(matches!(err, Error::Header { .. }), "{err}");
        assert_eq!(buffer.len(), 1);
    }
}
