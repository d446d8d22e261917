//! CSV row writer
//!
//! This writes one CSV row per [`Sample`] in a fixed field order. Fields the
//! sample does not carry are written as empty cells.

use std::io::Write;

use crate::{dataset::TIMESTAMP, sample::Sample, timestamp};

/// CSV writer errors
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// IO errors during write operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// CSV serialization errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// CSV capture writer
#[derive(Debug)]
pub struct Writer<W: Write> {
    inner: csv::Writer<W>,
    fields: Vec<String>,
}

impl<W: Write> Writer<W> {
    /// Create a new writer. `fields` is the column order after the leading
    /// timestamp column.
    #[must_use]
    pub fn new(writer: W, fields: Vec<String>) -> Self {
        let inner = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        Self { inner, fields }
    }

    /// Write the header row.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_header(&mut self) -> Result<(), Error> {
        self.inner
            .write_record(std::iter::once(TIMESTAMP).chain(self.fields.iter().map(String::as_str)))?;
        Ok(())
    }

    /// Write a single sample as one row.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_sample(&mut self, sample: &Sample) -> Result<(), Error> {
        let mut record = Vec::with_capacity(self.fields.len() + 1);
        record.push(timestamp::format(&sample.timestamp));
        for field in &self.fields {
            record.push(sample.field(field).map(|v| v.to_string()).unwrap_or_default());
        }
        self.inner.write_record(&record)?;
        Ok(())
    }

    /// Flush any buffered rows.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.inner.flush()?;
        Ok(())
    }
}
