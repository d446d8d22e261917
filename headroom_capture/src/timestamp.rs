//! Timestamp normalization
//!
//! Rows written by different recorder versions carry their timestamps in
//! slightly different textual forms. Everything is normalized to a
//! [`NaiveDateTime`] in local wall time.

use chrono::{DateTime, NaiveDateTime};

/// The format the recorder writes.
pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ACCEPTED: [&str; 4] = [
    FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors produced by [`parse`]
pub enum Error {
    /// The text matched none of the accepted formats.
    #[error("Unrecognized timestamp: {0:?}")]
    Unrecognized(String),
}

/// Parse a timestamp in any accepted format.
///
/// Accepted are `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DDTHH:MM:SS`, both with
/// optional fractional seconds, and RFC 3339 with an offset. An offset is
/// dropped, keeping the wall time it was recorded in.
///
/// # Errors
///
/// Returns [`Error::Unrecognized`] if no format matches.
pub fn parse(text: &str) -> Result<NaiveDateTime, Error> {
    let text = text.trim();
    for format in ACCEPTED {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(ts);
        }
    }
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.naive_local())
        .map_err(|_| Error::Unrecognized(text.to_string()))
}

/// Render a timestamp the way the recorder writes it.
#[must_use]
pub fn format(ts: &NaiveDateTime) -> String {
    ts.format(FORMAT).to_string()
}
