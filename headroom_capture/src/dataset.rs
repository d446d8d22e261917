//! A unified, time-ordered collection of samples
//!
//! Datasets are built by [`crate::load`] from one or more batches and are
//! then read by the analysis passes. Apart from date filtering and derived
//! columns being added once after load, a dataset is not mutated.

use chrono::NaiveDateTime;

use crate::sample::{FieldValue, Sample};

/// The name of the timestamp column.
pub const TIMESTAMP: &str = "timestamp";

#[derive(Debug, Clone, Default, PartialEq)]
/// Samples sorted by timestamp plus the column names seen across all of
/// their source batches.
pub struct Dataset {
    header: Vec<String>,
    samples: Vec<Sample>,
}

impl Dataset {
    /// Create a dataset. `samples` are stable-sorted by timestamp so that
    /// rows sharing a timestamp keep their source order.
    #[must_use]
    pub fn new(header: Vec<String>, mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        Self { header, samples }
    }

    /// Column names, in first-seen order. Does not include the timestamp
    /// column.
    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// All samples in timestamp order.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the dataset holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether `name` is a column of this dataset.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.header.iter().any(|h| h == name)
    }

    /// Add or replace column `name`, computing each sample's field with
    /// `compute`. Returning `None` leaves the field absent for that sample.
    pub fn add_column<F>(&mut self, name: &str, mut compute: F)
    where
        F: FnMut(&Sample) -> Option<FieldValue>,
    {
        if !self.has_column(name) {
            self.header.push(name.to_string());
        }
        for sample in &mut self.samples {
            if let Some(value) = compute(sample) {
                sample.set(name, value);
            }
        }
    }

    /// Keep only the samples for which `keep` returns true. The header is
    /// left as is.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&Sample) -> bool,
    {
        self.samples.retain(keep);
    }

    /// Every numeric value of `metric`, in timestamp order. Absent and empty
    /// fields are skipped.
    pub fn values<'a>(&'a self, metric: &'a str) -> impl Iterator<Item = f64> + 'a {
        self.samples.iter().filter_map(move |s| s.value(metric))
    }

    /// `(timestamp, value)` for every sample, keeping samples that carry no
    /// value for `metric` so positions line up with [`Dataset::samples`].
    #[must_use]
    pub fn points(&self, metric: &str) -> Vec<(NaiveDateTime, Option<f64>)> {
        self.samples
            .iter()
            .map(|s| (s.timestamp, s.value(metric)))
            .collect()
    }

    /// First and last timestamps, if any samples exist.
    #[must_use]
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let first = self.samples.first()?;
        let last = self.samples.last()?;
        Some((first.timestamp, last.timestamp))
    }
}
