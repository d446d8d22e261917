//! Terminal dashboard
//!
//! Renders an [`Analysis`] as plain text. Rendering is a pure function of the
//! analysis and writes to any [`fmt::Write`], so the binary can print it and
//! tests can inspect it.

use std::fmt::{self, Write};

use chrono::TimeDelta;

use crate::analysis::{
    Analysis, Error,
    heatmap::{BucketKey, Heatmap},
    peak::PeakWindow,
    stats::Statistics,
    sufficiency::Assessment,
};

/// Intensity glyphs, lowest first.
const RAMP: [char; 10] = ['.', ':', '-', '=', '+', '*', 'o', '#', '%', '@'];
const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
/// Hours shown as heatmap columns.
const HOURS: [u8; 8] = [0, 3, 6, 9, 12, 15, 18, 21];
const NAME_WIDTH: usize = 24;

/// Text rendering of one analysis.
#[derive(Debug, Clone, Copy)]
pub struct Dashboard<'a> {
    analysis: &'a Analysis,
    peak_window: TimeDelta,
}

impl<'a> Dashboard<'a> {
    /// Dashboard for `analysis`, whose peaks were found with `peak_window`.
    #[must_use]
    pub fn new(analysis: &'a Analysis, peak_window: TimeDelta) -> Self {
        Self {
            analysis,
            peak_window,
        }
    }

    /// Write the whole dashboard.
    ///
    /// # Errors
    ///
    /// Only errors from `out` are returned.
    pub fn render<W: Write>(&self, out: &mut W) -> fmt::Result {
        self.title(out)?;
        self.statistics(out)?;
        self.peaks(out)?;
        self.sufficiency(out)?;
        for metric in &self.analysis.summary.metrics {
            if let Some(heatmap) = self.analysis.heatmaps.get(metric) {
                writeln!(out)?;
                render_heatmap(out, metric, heatmap)?;
            }
        }
        Ok(())
    }

    fn title<W: Write>(&self, out: &mut W) -> fmt::Result {
        let summary = &self.analysis.summary;
        write!(out, "Headroom report")?;
        match (summary.first_date, summary.last_date) {
            (Some(first), Some(last)) if first == last => write!(out, ": {first}")?,
            (Some(first), Some(last)) => write!(out, ": {first} to {last}")?,
            _ => {}
        }
        writeln!(out, " ({} records)", summary.total_records)?;
        for (origin, reason) in &summary.rejected {
            writeln!(out, "  skipped {origin}: {reason}")?;
        }
        Ok(())
    }

    fn statistics<W: Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out)?;
        writeln!(out, "Statistics")?;
        writeln!(
            out,
            "{:<NAME_WIDTH$} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "metric", "min", "max", "mean", "median", "p75", "p95", "std"
        )?;
        for metric in self.analysis.summary.reported() {
            let Some(stats) = self.analysis.statistics.get(metric) else {
                continue;
            };
            let Statistics {
                min,
                max,
                mean,
                median,
                p75,
                p95,
                std,
                ..
            } = *stats;
            write!(out, "{metric:<NAME_WIDTH$}")?;
            for v in [min, max, mean, median, p75, p95, std] {
                write!(out, " {:>10}", value(metric, v))?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    fn peaks<W: Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out)?;
        writeln!(
            out,
            "Peak {}-minute windows",
            self.peak_window.num_minutes()
        )?;
        for metric in &self.analysis.summary.metrics {
            let Some(peak) = self.analysis.peaks.get(metric) else {
                continue;
            };
            let PeakWindow { start, average, .. } = *peak;
            match start {
                Some(start) => {
                    let end = start + self.peak_window;
                    writeln!(
                        out,
                        "{metric:<NAME_WIDTH$} {} to {}  avg {}",
                        start.format("%Y-%m-%d %H:%M"),
                        end.format("%H:%M"),
                        value(metric, average)
                    )?;
                }
                None => writeln!(out, "{metric:<NAME_WIDTH$} no data")?,
            }
        }
        Ok(())
    }

    fn sufficiency<W: Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out)?;
        writeln!(out, "Headroom sufficiency (p95 - p75) / max")?;
        for metric in self.analysis.summary.reported() {
            let Some(score) = self.analysis.sufficiency.get(metric) else {
                continue;
            };
            writeln!(
                out,
                "{metric:<NAME_WIDTH$} {score:>8.3}  {}",
                Assessment::of(*score)
            )?;
        }
        Ok(())
    }
}

/// Write the message shown instead of a dashboard when analysis fails.
///
/// # Errors
///
/// Only errors from `out` are returned.
pub fn render_error<W: Write>(out: &mut W, error: &Error) -> fmt::Result {
    if error.is_no_data() {
        writeln!(out, "Nothing to report: {error}")
    } else {
        writeln!(out, "Analysis failed: {error}")
    }
}

fn value(metric: &str, v: f64) -> String {
    if metric.ends_with("percent") {
        format!("{v:.1}%")
    } else {
        format!("{v:.2}")
    }
}

/// Glyph for `v` on a ten-step scale between `min` and `max`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn glyph(v: f64, min: f64, max: f64) -> char {
    let span = max - min;
    if span <= 0.0 {
        return RAMP[RAMP.len() - 1];
    }
    let step = ((v - min) / span * (RAMP.len() - 1) as f64).round() as usize;
    RAMP[step.min(RAMP.len() - 1)]
}

fn render_heatmap<W: Write>(out: &mut W, metric: &str, heatmap: &Heatmap) -> fmt::Result {
    writeln!(out, "{metric} by day and hour")?;
    let (min, max) = heatmap
        .values()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    if heatmap.is_empty() {
        return writeln!(out, "  no data");
    }

    write!(out, "    ")?;
    for hour in HOURS {
        write!(out, " {hour:02}")?;
    }
    writeln!(out)?;

    for (idx, name) in DAYS.iter().enumerate() {
        write!(out, "{name} ")?;
        for hour in HOURS {
            #[allow(clippy::cast_possible_truncation)]
            let key = BucketKey {
                day: idx as u8 + 1,
                hour,
            };
            let cell = heatmap.get(&key).map_or(' ', |v| glyph(*v, min, max));
            write!(out, "  {cell}")?;
        }
        writeln!(out)?;
    }

    write!(out, "    {} low ", value(metric, min))?;
    for g in RAMP {
        write!(out, "{g}")?;
    }
    writeln!(out, " high {}", value(metric, max))
}
