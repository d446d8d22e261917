//! Day-of-week by hour-of-day averages.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime, Timelike};
use headroom_capture::dataset::Dataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A heatmap cell.
pub struct BucketKey {
    /// ISO weekday, 1 is Monday and 7 is Sunday
    pub day: u8,
    /// Hour of day, 0 through 23
    pub hour: u8,
}

impl BucketKey {
    /// The bucket `ts` falls in.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn of(ts: &NaiveDateTime) -> Self {
        Self {
            day: ts.weekday().number_from_monday() as u8,
            hour: ts.hour() as u8,
        }
    }
}

/// Mean value per bucket. Buckets without a value are absent.
pub type Heatmap = BTreeMap<BucketKey, f64>;

/// Average every numeric value of `metric` by bucket.
#[must_use]
pub fn aggregate(dataset: &Dataset, metric: &str) -> Heatmap {
    let mut sums: BTreeMap<BucketKey, (f64, usize)> = BTreeMap::new();
    for sample in dataset.samples() {
        if let Some(v) = sample.value(metric) {
            let (sum, count) = sums.entry(BucketKey::of(&sample.timestamp)).or_default();
            *sum += v;
            *count += 1;
        }
    }
    sums.into_iter()
        .map(|(key, (sum, count))| (key, sum / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use headroom_capture::sample::{FieldValue, Sample};

    use super::*;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        // 2025-03-10 is a Monday
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn buckets_by_weekday_and_hour() {
        let samples = vec![
            Sample::from_values(at(10, 8, 0), [("cpu", 10.0)]),
            Sample::from_values(at(10, 8, 30), [("cpu", 20.0)]),
            Sample::from_values(at(11, 10, 0), [("cpu", 40.0)]),
        ];
        let dataset = Dataset::new(vec!["cpu".to_string()], samples);
        let heatmap = aggregate(&dataset, "cpu");

        assert_eq!(heatmap.len(), 2);
        assert_eq!(heatmap.get(&BucketKey { day: 1, hour: 8 }), Some(&15.0));
        assert_eq!(heatmap.get(&BucketKey { day: 2, hour: 10 }), Some(&40.0));
    }

    #[test]
    fn sunday_is_seven_and_empty_buckets_absent() {
        let mut empty = Sample::new(at(15, 23, 0));
        empty.set("cpu", FieldValue::Empty);
        let samples = vec![
            Sample::from_values(at(16, 23, 59), [("cpu", 5.0)]),
            empty,
            Sample::from_values(at(14, 1, 0), [("gpu", 5.0)]),
        ];
        let dataset = Dataset::new(vec!["cpu".to_string(), "gpu".to_string()], samples);
        let heatmap = aggregate(&dataset, "cpu");

        assert_eq!(heatmap.len(), 1);
        assert_eq!(heatmap.get(&BucketKey { day: 7, hour: 23 }), Some(&5.0));
    }
}
