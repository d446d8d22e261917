//! Headroom sufficiency heuristic.
//!
//! The score is the gap between the 95th and 75th percentile relative to the
//! maximum. A small gap means usage rarely climbs far above its usual level.

use std::collections::BTreeMap;
use std::fmt;

use super::stats::Statistics;

/// `(p95 - p75) / max`, or 0.0 when `max` is 0.
#[must_use]
pub fn score(stats: &Statistics) -> f64 {
    if stats.max == 0.0 {
        0.0
    } else {
        (stats.p95 - stats.p75) / stats.max
    }
}

/// Score every metric.
#[must_use]
pub fn scores(statistics: &BTreeMap<String, Statistics>) -> BTreeMap<String, f64> {
    statistics
        .iter()
        .map(|(name, stats)| (name.clone(), score(stats)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Presentation band for a score.
pub enum Assessment {
    /// Below 0.05
    VeryTight,
    /// Below 0.1
    Tight,
    /// Below 0.2
    Adequate,
    /// 0.2 and above
    Generous,
}

impl Assessment {
    /// The band `score` falls in.
    #[must_use]
    pub fn of(score: f64) -> Self {
        if score < 0.05 {
            Self::VeryTight
        } else if score < 0.1 {
            Self::Tight
        } else if score < 0.2 {
            Self::Adequate
        } else {
            Self::Generous
        }
    }
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::VeryTight => "very tight",
            Self::Tight => "tight",
            Self::Adequate => "adequate",
            Self::Generous => "generous",
        })
    }
}
