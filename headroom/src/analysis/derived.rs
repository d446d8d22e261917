//! Memory pressure metrics computed from the raw memory fields.

use headroom_capture::{dataset::Dataset, sample::FieldValue};

/// Used memory as a percentage of total memory.
pub const RAM_PERCENT: &str = "ram_percent";
/// Used swap as a percentage of total memory.
pub const SWAP_PRESSURE_PERCENT: &str = "swap_pressure_percent";

/// Total physical memory.
pub const MEMORY_TOTAL: &str = "memory_total";
/// Physical memory in use.
pub const MEMORY_USED: &str = "memory_used";
/// Swap in use.
pub const MEMORY_SWAP_USED: &str = "memory_swap_used";

/// Whether `metric` is computed here rather than recorded.
#[must_use]
pub fn is_derived(metric: &str) -> bool {
    metric == RAM_PERCENT || metric == SWAP_PRESSURE_PERCENT
}

/// The recorded fields `metric` is computed from. Empty for recorded
/// metrics.
#[must_use]
pub fn inputs_of(metric: &str) -> &'static [&'static str] {
    match metric {
        RAM_PERCENT => &[MEMORY_USED, MEMORY_TOTAL],
        SWAP_PRESSURE_PERCENT => &[MEMORY_SWAP_USED, MEMORY_TOTAL],
        _ => &[],
    }
}

/// `numerator / denominator * 100`.
///
/// A denominator that is absent, empty or not positive yields 0.0. Otherwise
/// a missing numerator yields [`FieldValue::Empty`].
#[must_use]
pub fn percent_of(numerator: Option<f64>, denominator: Option<f64>) -> FieldValue {
    match denominator {
        Some(total) if total > 0.0 => match numerator {
            Some(part) => FieldValue::Number(part / total * 100.0),
            None => FieldValue::Empty,
        },
        _ => FieldValue::Number(0.0),
    }
}

/// Add [`RAM_PERCENT`] and [`SWAP_PRESSURE_PERCENT`] to every sample and to
/// the dataset header.
pub fn add_derived_metrics(dataset: &mut Dataset) {
    dataset.add_column(RAM_PERCENT, |s| {
        Some(percent_of(s.value(MEMORY_USED), s.value(MEMORY_TOTAL)))
    });
    dataset.add_column(SWAP_PRESSURE_PERCENT, |s| {
        Some(percent_of(s.value(MEMORY_SWAP_USED), s.value(MEMORY_TOTAL)))
    });
}
