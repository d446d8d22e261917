//! Validation logic for capture files
//!
//! This module holds the canonical checks for a capture batch. The
//! `validate` subcommand and tests both go through [`validate_batch`].

use chrono::NaiveDateTime;

use crate::{dataset::TIMESTAMP, load::Batch, timestamp};

/// Result of validating capture invariants
#[derive(Debug)]
pub struct ValidationResult {
    /// Total number of data rows validated
    pub row_count: u64,
    /// Number of columns in the header, timestamp included
    pub column_count: usize,
    /// Earliest and latest timestamps that parsed
    pub time_range: Option<(NaiveDateTime, NaiveDateTime)>,
    /// Rows whose timestamp did not parse, or a missing timestamp column
    pub timestamp_errors: u64,
    /// Rows whose timestamp is earlier than the row before it
    pub ordering_errors: u64,
    /// Rows whose cell count differs from the header
    pub width_errors: u64,
    /// Minimum rows violations (when `min_rows` is specified)
    pub min_rows_errors: u64,
    /// First error encountered (row number, category, message)
    pub first_error: Option<(u64, String, String)>,
}

impl ValidationResult {
    /// Returns true if validation passed with no errors
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.timestamp_errors == 0
            && self.ordering_errors == 0
            && self.width_errors == 0
            && self.min_rows_errors == 0
    }

    fn record(&mut self, row: u64, category: &str, msg: String) {
        if self.first_error.is_none() {
            self.first_error = Some((row, category.to_string(), msg));
        }
    }
}

/// Validate a capture batch.
///
/// Checks that a timestamp column exists, every timestamp parses,
/// timestamps never go backwards, every row matches the header width and,
/// when `min_rows` is given, that at least that many rows exist.
#[must_use]
pub fn validate_batch(batch: &Batch, min_rows: Option<u64>) -> ValidationResult {
    let mut result = ValidationResult {
        row_count: 0,
        column_count: batch.header.len(),
        time_range: None,
        timestamp_errors: 0,
        ordering_errors: 0,
        width_errors: 0,
        min_rows_errors: 0,
        first_error: None,
    };

    let Some(ts_idx) = batch.header.iter().position(|h| h == TIMESTAMP) else {
        result.timestamp_errors += 1;
        result.record(0, "header", format!("header has no '{TIMESTAMP}' column"));
        return result;
    };

    let mut previous: Option<NaiveDateTime> = None;
    for (idx, row) in batch.rows.iter().enumerate() {
        let row_no = idx as u64 + 1;
        result.row_count += 1;

        if row.len() != batch.header.len() {
            result.width_errors += 1;
            result.record(
                row_no,
                "width",
                format!("expected {} cells, found {}", batch.header.len(), row.len()),
            );
        }

        let Some(cell) = row.get(ts_idx) else {
            continue;
        };
        match timestamp::parse(cell) {
            Ok(ts) => {
                if let Some(prev) = previous {
                    if ts < prev {
                        result.ordering_errors += 1;
                        result.record(
                            row_no,
                            "ordering",
                            format!("{ts} is earlier than the previous row's {prev}"),
                        );
                    }
                }
                previous = Some(ts);
                result.time_range = Some(match result.time_range {
                    None => (ts, ts),
                    Some((lo, hi)) => (lo.min(ts), hi.max(ts)),
                });
            }
            Err(e) => {
                result.timestamp_errors += 1;
                result.record(row_no, "timestamp", e.to_string());
            }
        }
    }

    if let Some(min) = min_rows {
        if result.row_count < min {
            result.min_rows_errors += 1;
            result.record(
                result.row_count,
                "min_rows",
                format!("found {} rows, need at least {min}", result.row_count),
            );
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(text: &str) -> Batch {
        Batch::from_reader("test", text.as_bytes()).expect("valid csv")
    }

    #[test]
    fn valid_capture() {
        let b = batch(
            "timestamp,cpu_usage_percent\n\
             2025-03-10 08:00:00,1\n\
             2025-03-10 08:00:01,2\n\
             2025-03-10 08:00:01,3\n",
        );
        let result = validate_batch(&b, Some(3));
        assert!(result.is_valid(), "{result:?}");
        assert_eq!(result.row_count, 3);
        assert_eq!(result.column_count, 2);
        assert!(result.first_error.is_none());
    }

    #[test]
    fn detects_backwards_time() {
        let b = batch(
            "timestamp,cpu_usage_percent\n\
             2025-03-10 08:00:05,1\n\
             2025-03-10 08:00:01,2\n",
        );
        let result = validate_batch(&b, None);
        assert!(!result.is_valid());
        assert_eq!(result.ordering_errors, 1);
        let (row, category, _) = result.first_error.unwrap();
        assert_eq!(row, 2);
        assert_eq!(category, "ordering");
    }

    #[test]
    fn detects_bad_timestamps_and_width() {
        let b = batch(
            "timestamp,a,b\n\
             garbage,1,2\n\
             2025-03-10 08:00:01,2\n",
        );
        let result = validate_batch(&b, None);
        assert_eq!(result.timestamp_errors, 1);
        assert_eq!(result.width_errors, 1);
        assert_eq!(result.first_error.unwrap().1, "timestamp");
    }

    #[test]
    fn missing_timestamp_column() {
        let b = batch("when,a\nx,1\n");
        let result = validate_batch(&b, None);
        assert!(!result.is_valid());
        assert_eq!(result.first_error.unwrap().1, "header");
    }

    #[test]
    fn min_rows() {
        let b = batch("timestamp,a\n2025-03-10 08:00:00,1\n");
        let result = validate_batch(&b, Some(2));
        assert_eq!(result.min_rows_errors, 1);
        assert!(!result.is_valid());
    }
}
