//! Load capture batches into a [`Dataset`]
//!
//! A batch is the contents of one capture file: a header row and the rows
//! beneath it. Batches that cannot be read or whose timestamps do not
//! normalize are rejected one at a time; the load as a whole only fails when
//! nothing usable remains.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    dataset::{Dataset, TIMESTAMP},
    sample::{FieldValue, Sample},
    timestamp,
};

/// Errors produced while loading
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Nothing could be loaded.
    #[error("No data: {supplied} batches supplied, {rejected} rejected")]
    NoData {
        /// Number of batches offered to the loader.
        supplied: usize,
        /// Number of those batches that were rejected.
        rejected: usize,
    },
    /// Wrapper around [`io::Error`].
    #[error("Io error: {0}")]
    Io(#[from] io::Error),
    /// Wrapper around [`csv::Error`].
    #[error("Csv error: {0}")]
    Csv(#[from] csv::Error),
    /// The batch has no timestamp column.
    #[error("Missing '{TIMESTAMP}' column")]
    MissingTimestamp,
    /// A row's timestamp did not normalize.
    #[error("Row {row}: {source}")]
    Timestamp {
        /// One-based data row number, header excluded.
        row: usize,
        /// The underlying parse failure.
        #[source]
        source: timestamp::Error,
    },
    /// A row does not have as many cells as the header.
    #[error("Row {row}: expected {expected} cells, found {found}")]
    RowWidth {
        /// One-based data row number, header excluded.
        row: usize,
        /// Header width.
        expected: usize,
        /// Row width.
        found: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Raw rows sharing one header, typically the contents of one file.
pub struct Batch {
    /// Where the batch came from, used when reporting rejections.
    pub origin: String,
    /// Column names in file order, including the timestamp column.
    pub header: Vec<String>,
    /// Rows of raw cells.
    pub rows: Vec<Vec<String>>,
}

impl Batch {
    /// Create a batch from rows already in memory.
    #[must_use]
    pub fn new(origin: impl Into<String>, header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            origin: origin.into(),
            header,
            rows,
        }
    }

    /// Read a batch of CSV from `reader`. The first record is the header.
    /// Rows of the wrong width are kept as-is; they are caught when the batch
    /// is converted into samples.
    ///
    /// # Errors
    ///
    /// Returns an error if the CSV is malformed or reading fails.
    pub fn from_reader<R: io::Read>(origin: impl Into<String>, reader: R) -> Result<Self, Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);
        let header = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self::new(origin, header, rows))
    }

    /// Read a batch from the CSV file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is malformed.
    pub fn read(path: &Path) -> Result<Self, Error> {
        let file = fs::File::open(path)?;
        Self::from_reader(path.display().to_string(), io::BufReader::new(file))
    }

    /// Convert rows into samples. Returns the non-timestamp column names and
    /// the samples in row order.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no timestamp column, a row is the wrong
    /// width, or any timestamp fails to normalize.
    pub fn into_samples(self) -> Result<(Vec<String>, Vec<Sample>), Error> {
        let ts_idx = self
            .header
            .iter()
            .position(|h| h == TIMESTAMP)
            .ok_or(Error::MissingTimestamp)?;
        let width = self.header.len();

        let mut samples = Vec::with_capacity(self.rows.len());
        for (idx, row) in self.rows.into_iter().enumerate() {
            let row_no = idx + 1;
            if row.len() != width {
                return Err(Error::RowWidth {
                    row: row_no,
                    expected: width,
                    found: row.len(),
                });
            }
            let ts = timestamp::parse(&row[ts_idx])
                .map_err(|source| Error::Timestamp { row: row_no, source })?;
            let mut sample = Sample::new(ts);
            for (col, cell) in row.iter().enumerate() {
                if col != ts_idx {
                    sample.set(self.header[col].as_str(), FieldValue::parse(cell));
                }
            }
            samples.push(sample);
        }

        let columns = self
            .header
            .into_iter()
            .enumerate()
            .filter_map(|(i, h)| (i != ts_idx).then_some(h))
            .collect();
        Ok((columns, samples))
    }
}

#[derive(Debug)]
/// A batch left out of the load and why.
pub struct Rejected {
    /// [`Batch::origin`] of the rejected batch, or the path that failed to
    /// read.
    pub origin: String,
    /// Why it was rejected.
    pub reason: Error,
}

#[derive(Debug)]
/// The result of a successful load.
pub struct Loaded {
    /// All accepted samples, concatenated and sorted by timestamp.
    pub dataset: Dataset,
    /// Batches that were excluded.
    pub rejected: Vec<Rejected>,
}

/// Load in-memory batches into one dataset.
///
/// Batches are concatenated in the order given, never merged or
/// deduplicated, and the result is stable-sorted by timestamp.
///
/// # Errors
///
/// Returns [`Error::NoData`] if no batch was supplied or none was accepted.
pub fn load<I>(batches: I) -> Result<Loaded, Error>
where
    I: IntoIterator<Item = Batch>,
{
    load_results(batches.into_iter().map(Ok))
}

/// Load the CSV files at `paths`. Files that fail to read are rejected like
/// any other bad batch.
///
/// # Errors
///
/// Returns [`Error::NoData`] if `paths` is empty or no file was accepted.
pub fn load_files(paths: &[PathBuf]) -> Result<Loaded, Error> {
    load_results(paths.iter().map(|path| {
        Batch::read(path).map_err(|reason| Rejected {
            origin: path.display().to_string(),
            reason,
        })
    }))
}

fn load_results<I>(batches: I) -> Result<Loaded, Error>
where
    I: Iterator<Item = Result<Batch, Rejected>>,
{
    let mut header: Vec<String> = Vec::new();
    let mut samples = Vec::new();
    let mut rejected = Vec::new();
    let mut supplied = 0;
    let mut accepted = 0;

    for batch in batches {
        supplied += 1;
        let batch = match batch {
            Ok(batch) => batch,
            Err(rej) => {
                warn!("Excluding {origin}: {reason}", origin = rej.origin, reason = rej.reason);
                rejected.push(rej);
                continue;
            }
        };
        let origin = batch.origin.clone();
        match batch.into_samples() {
            Ok((columns, mut batch_samples)) => {
                debug!("Loaded {count} rows from {origin}", count = batch_samples.len());
                for column in columns {
                    if !header.contains(&column) {
                        header.push(column);
                    }
                }
                samples.append(&mut batch_samples);
                accepted += 1;
            }
            Err(reason) => {
                warn!("Excluding {origin}: {reason}");
                rejected.push(Rejected { origin, reason });
            }
        }
    }

    if accepted == 0 {
        return Err(Error::NoData {
            supplied,
            rejected: rejected.len(),
        });
    }

    Ok(Loaded {
        dataset: Dataset::new(header, samples),
        rejected,
    })
}
