//! Canonical representation of a capture row
//!
//! A [`Sample`] is one point-in-time observation. Every field of a sample is
//! in one of three states: present with a number, present but empty, or
//! absent altogether. Only the first carries data; the other two are kept
//! apart so that zero guards downstream can tell "no data" from a true zero.

use chrono::NaiveDateTime;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
/// The value of a single field in a [`Sample`].
pub enum FieldValue {
    /// The field was recorded with a numeric value.
    Number(f64),
    /// The field was recorded but carried no value, an empty CSV cell.
    Empty,
}

impl FieldValue {
    /// Parse a raw CSV cell. Empty, non-numeric and non-finite cells become
    /// [`FieldValue::Empty`].
    #[must_use]
    pub fn parse(cell: &str) -> Self {
        cell.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map_or(Self::Empty, Self::Number)
    }

    /// The numeric value, if any.
    #[must_use]
    pub fn as_f64(self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(n),
            FieldValue::Empty => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Empty => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// One observation: a timestamp and the fields recorded at that instant.
pub struct Sample {
    /// Wall-clock time the sample was taken, local time without offset.
    pub timestamp: NaiveDateTime,
    fields: FxHashMap<String, FieldValue>,
}

impl Sample {
    /// Create a sample with no fields.
    #[must_use]
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            fields: FxHashMap::default(),
        }
    }

    /// Create a sample whose fields are all numeric.
    #[must_use]
    pub fn from_values<I, K>(timestamp: NaiveDateTime, values: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let fields = values
            .into_iter()
            .map(|(k, v)| (k.into(), FieldValue::Number(v)))
            .collect();
        Self { timestamp, fields }
    }

    /// Set `name` to `value`, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// The state of field `name`. `None` means the field is absent.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        self.fields.get(name).copied()
    }

    /// The numeric value of `name`, or `None` if it is absent or empty.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(FieldValue::as_f64)
    }

    /// Number of fields present, numeric or empty.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the sample has no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn three_states_are_distinct() {
        let mut sample = Sample::new(ts());
        sample.set("cpu_usage_percent", FieldValue::Number(0.0));
        sample.set("gpu_usage_percent", FieldValue::Empty);

        assert_eq!(
            sample.field("cpu_usage_percent"),
            Some(FieldValue::Number(0.0))
        );
        assert_eq!(sample.value("cpu_usage_percent"), Some(0.0));
        assert_eq!(sample.field("gpu_usage_percent"), Some(FieldValue::Empty));
        assert_eq!(sample.value("gpu_usage_percent"), None);
        assert_eq!(sample.field("power_cpu"), None);
        assert_eq!(sample.value("power_cpu"), None);
    }

    #[test]
    fn parse_cells() {
        assert_eq!(FieldValue::parse(""), FieldValue::Empty);
        assert_eq!(FieldValue::parse("  "), FieldValue::Empty);
        assert_eq!(FieldValue::parse("abc"), FieldValue::Empty);
        assert_eq!(FieldValue::parse("42.5"), FieldValue::Number(42.5));
        assert_eq!(FieldValue::parse(" 7 "), FieldValue::Number(7.0));
        assert_eq!(FieldValue::parse("NaN"), FieldValue::Empty);
        assert_eq!(FieldValue::parse("inf"), FieldValue::Empty);
    }

    #[test]
    fn display_matches_csv_cells() {
        assert_eq!(FieldValue::Number(8_589_934_592.0).to_string(), "8589934592");
        assert_eq!(FieldValue::Number(12.25).to_string(), "12.25");
        assert_eq!(FieldValue::Empty.to_string(), "");
    }
}
