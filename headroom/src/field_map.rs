//! Canonical field mapping
//!
//! The monitoring tool exposes its gauges under its own metric names, some of
//! them split by label. A [`FieldMap`] is the table that turns those into the
//! canonical field names used in capture files. It is plain data: a different
//! tool or tool version is supported by a different table, loaded from the
//! configuration file.

use rustc_hash::FxHashMap;
use serde::Deserialize;

/// `mactop` gauge of CPU utilization.
pub const MACTOP_CPU_USAGE: &str = "mactop_cpu_usage_percent";
/// `mactop` gauge of GPU utilization.
pub const MACTOP_GPU_USAGE: &str = "mactop_gpu_usage_percent";
/// `mactop` gauge of GPU frequency.
pub const MACTOP_GPU_FREQ: &str = "mactop_gpu_freq_mhz";
/// `mactop` memory gauge, split by a `type` label.
pub const MACTOP_MEMORY: &str = "mactop_memory_gb";
/// `mactop` power gauge, split by a `component` label.
pub const MACTOP_POWER: &str = "mactop_power_watts";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
/// Maps one (metric, label key, label value) combination to a field.
pub struct LabelRule {
    /// Exposed metric name.
    pub metric: String,
    /// Label key to inspect.
    pub label: String,
    /// Label value that selects this rule.
    pub value: String,
    /// Canonical field the line's value is stored under.
    pub field: String,
}

impl LabelRule {
    fn new(metric: &str, label: &str, value: &str, field: &str) -> Self {
        Self {
            metric: metric.to_string(),
            label: label.to_string(),
            value: value.to_string(),
            field: field.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
/// Translation table from exposed metrics to canonical fields.
///
/// Unlabelled metrics keep their exposed name unless listed in `renames`.
/// Labelled metrics are kept only when one of their labels matches a rule in
/// `labels`; every other labelled line is dropped.
pub struct FieldMap {
    /// Exposed name to canonical name, for unlabelled metrics.
    #[serde(default)]
    pub renames: FxHashMap<String, String>,
    /// Rules for labelled metrics.
    #[serde(default)]
    pub labels: Vec<LabelRule>,
}

impl Default for FieldMap {
    fn default() -> Self {
        let renames = [
            (MACTOP_CPU_USAGE, "cpu_usage_percent"),
            (MACTOP_GPU_USAGE, "gpu_usage_percent"),
            (MACTOP_GPU_FREQ, "gpu_freq_mhz"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        let labels = vec![
            LabelRule::new(MACTOP_MEMORY, "type", "total", "memory_total"),
            LabelRule::new(MACTOP_MEMORY, "type", "used", "memory_used"),
            LabelRule::new(MACTOP_MEMORY, "type", "swap_total", "memory_swap_total"),
            LabelRule::new(MACTOP_MEMORY, "type", "swap_used", "memory_swap_used"),
            LabelRule::new(MACTOP_POWER, "component", "cpu", "power_cpu"),
            LabelRule::new(MACTOP_POWER, "component", "gpu", "power_gpu"),
            LabelRule::new(MACTOP_POWER, "component", "total", "power_total"),
        ];

        Self { renames, labels }
    }
}

impl FieldMap {
    /// Canonical name for an unlabelled metric.
    #[must_use]
    pub fn unlabeled<'a>(&'a self, name: &'a str) -> &'a str {
        self.renames.get(name).map_or(name, String::as_str)
    }

    /// Canonical name for a labelled metric, or `None` if no rule matches
    /// any of its labels. Labels are checked in order; the first match wins.
    #[must_use]
    pub fn labeled<K, V>(&self, name: &str, labels: &[(K, V)]) -> Option<&str>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        labels.iter().find_map(|(key, value)| {
            self.labels
                .iter()
                .find(|rule| {
                    rule.metric == name
                        && rule.label == key.as_ref()
                        && rule.value == value.as_ref()
                })
                .map(|rule| rule.field.as_str())
        })
    }
}
