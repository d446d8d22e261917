//! Highest-average fixed-duration window of a series.
//!
//! The scan starts a window at every point but the last and keeps the best
//! average seen, starting from 0.0 with a strict comparison. A series whose
//! best window averages zero or less therefore reports index 0 and average
//! 0.0, the same as a series with no values at all.

use chrono::{NaiveDateTime, TimeDelta};

/// Window width used when none is configured.
pub const DEFAULT_WINDOW_MINUTES: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq)]
/// Where the peak window starts and what it averages.
pub struct PeakWindow {
    /// Index of the first point of the window
    pub start_index: usize,
    /// Timestamp of that point, `None` when there are no points
    pub start: Option<NaiveDateTime>,
    /// Mean of the present values inside the window
    pub average: f64,
}

/// Find the window of width `window` with the highest average.
///
/// `points` must be in timestamp order. Points without a value count toward
/// neither the sum nor the count of a window.
#[must_use]
pub fn find_peak_window(points: &[(NaiveDateTime, Option<f64>)], window: TimeDelta) -> PeakWindow {
    let at = |start_index: usize, average: f64| PeakWindow {
        start_index,
        start: points.get(start_index).map(|(ts, _)| *ts),
        average,
    };

    if points.len() < 2 {
        return at(0, 0.0);
    }

    let (lo, hi) = points
        .iter()
        .fold((points[0].0, points[0].0), |(lo, hi), (ts, _)| {
            (lo.min(*ts), hi.max(*ts))
        });
    if hi - lo < window {
        return at(0, mean(points.iter().filter_map(|(_, v)| *v)));
    }

    let mut best = at(0, 0.0);
    for (i, (start, _)) in points[..points.len() - 1].iter().enumerate() {
        let end = *start + window;
        let average = mean(
            points[i..]
                .iter()
                .take_while(|(ts, _)| *ts <= end)
                .filter_map(|(_, v)| *v),
        );
        if average > best.average {
            best = at(i, average);
        }
    }
    best
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use proptest::prelude::*;

    use super::*;

    fn at(minute: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
            + TimeDelta::minutes(minute)
    }

    fn window() -> TimeDelta {
        TimeDelta::minutes(i64::from(DEFAULT_WINDOW_MINUTES))
    }

    #[test]
    fn fewer_than_two_points() {
        let none = find_peak_window(&[], window());
        assert_eq!(none.start_index, 0);
        assert_eq!(none.start, None);
        assert_eq!(none.average, 0.0);

        let one = find_peak_window(&[(at(0), Some(90.0))], window());
        assert_eq!(one.start_index, 0);
        assert_eq!(one.start, Some(at(0)));
        assert_eq!(one.average, 0.0);
    }

    #[test]
    fn short_span_averages_everything() {
        let points = [(at(0), Some(10.0)), (at(5), None), (at(10), Some(30.0))];
        let peak = find_peak_window(&points, window());
        assert_eq!(peak.start_index, 0);
        assert_eq!(peak.average, 20.0);

        let empty = [(at(0), None), (at(5), None)];
        assert_eq!(find_peak_window(&empty, window()).average, 0.0);
    }

    #[test]
    fn finds_the_busiest_window() {
        let points: Vec<_> = (0..60)
            .map(|m| {
                let v = if (30..=45).contains(&m) { 90.0 } else { 10.0 };
                (at(m), Some(v))
            })
            .collect();
        let peak = find_peak_window(&points, window());
        assert_eq!(peak.start_index, 30);
        assert_eq!(peak.start, Some(at(30)));
        assert_eq!(peak.average, 90.0);
    }

    #[test]
    fn window_end_is_inclusive() {
        let points = [(at(0), Some(30.0)), (at(15), Some(10.0)), (at(40), Some(1.0))];
        let peak = find_peak_window(&points, window());
        assert_eq!(peak.start_index, 0);
        assert_eq!(peak.average, 20.0);
    }

    #[test]
    fn last_point_never_starts_a_window() {
        let points = [(at(0), Some(1.0)), (at(30), Some(2.0)), (at(60), Some(100.0))];
        let peak = find_peak_window(&points, window());
        assert_eq!(peak.start_index, 1);
        assert_eq!(peak.average, 2.0);
    }

    #[test]
    fn first_window_wins_ties() {
        let points = [(at(0), Some(5.0)), (at(20), Some(5.0)), (at(40), Some(5.0))];
        assert_eq!(find_peak_window(&points, window()).start_index, 0);
    }

    #[test]
    fn zero_peak_matches_no_peak() {
        let points = [(at(0), Some(0.0)), (at(20), Some(0.0)), (at(40), Some(-3.0))];
        let peak = find_peak_window(&points, window());
        assert_eq!(peak.start_index, 0);
        assert_eq!(peak.average, 0.0);
    }

    proptest! {
        #[test]
        fn peak_is_within_value_range(
            values in prop::collection::vec(0.0f64..100.0, 2..120),
            step in 1i64..120,
        ) {
            let points: Vec<_> = values
                .iter()
                .enumerate()
                .map(|(i, v)| (at(i as i64 * step), Some(*v)))
                .collect();
            let peak = find_peak_window(&points, window());
            let max = values.iter().copied().fold(0.0, f64::max);
            prop_assert!(peak.average >= 0.0);
            prop_assert!(peak.average <= max + 1e-9);
            prop_assert!(peak.start_index < points.len());
        }
    }
}
