//! Bounded in-memory sample buffer
//!
//! The recorder holds samples here between flushes to disk. The buffer never
//! grows past its capacity: when a flush has failed and the buffer is full,
//! the oldest sample is dropped to make room for the newest.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use tracing::warn;

use crate::sample::Sample;

#[derive(Debug)]
/// A bounded FIFO of samples awaiting flush.
pub struct Buffer {
    capacity: NonZeroUsize,
    samples: VecDeque<Sample>,
    dropped: u64,
}

impl Buffer {
    /// Create an empty buffer holding at most `capacity` samples.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity.get()),
            dropped: 0,
        }
    }

    /// Append `sample`. Returns true when the buffer is full and should be
    /// flushed.
    pub fn push(&mut self, sample: Sample) -> bool {
        if self.samples.len() >= self.capacity.get() {
            self.samples.pop_front();
            self.dropped += 1;
            warn!(
                "Sample buffer full, dropped oldest sample ({dropped} total)",
                dropped = self.dropped
            );
        }
        self.samples.push_back(sample);
        self.is_full()
    }

    /// Whether the buffer holds `capacity` samples.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity.get()
    }

    /// Samples waiting to be flushed, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Number of samples waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples lost to overflow since creation.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Discard every pending sample, called once they are safely on disk.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Discard the `n` oldest pending samples. Used after a partial flush so
    /// only the unwritten tail is retried.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.samples.len());
        self.samples.drain(..n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(v: f64) -> Sample {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Sample::from_values(ts, [("v", v)])
    }

    #[test]
    fn signals_full_at_capacity() {
        let mut buffer = Buffer::new(NonZeroUsize::new(3).unwrap());
        assert!(!buffer.push(sample(1.0)));
        assert!(!buffer.push(sample(2.0)));
        assert!(buffer.push(sample(3.0)));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut buffer = Buffer::new(NonZeroUsize::new(2).unwrap());
        buffer.push(sample(1.0));
        buffer.push(sample(2.0));
        buffer.push(sample(3.0));

        let values: Vec<f64> = buffer.pending().filter_map(|s| s.value("v")).collect();
        assert_eq!(values, vec![2.0, 3.0]);
        assert_eq!(buffer.dropped(), 1);
    }

    #[test]
    fn clear_empties() {
        let mut buffer = Buffer::new(NonZeroUsize::new(2).unwrap());
        buffer.push(sample(1.0));
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(!buffer.is_full());
    }

    #[test]
    fn consume_keeps_the_tail() {
        let mut buffer = Buffer::new(NonZeroUsize::new(3).unwrap());
        for v in [1.0, 2.0, 3.0] {
            buffer.push(sample(v));
        }
        buffer.consume(2);
        let values: Vec<f64> = buffer.pending().filter_map(|s| s.value("v")).collect();
        assert_eq!(values, vec![3.0]);
        buffer.consume(5);
        assert!(buffer.is_empty());
    }
}
