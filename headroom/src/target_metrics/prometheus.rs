//! Prometheus target metrics recorder
//!
//! This module scrapes the Prometheus formatted endpoint of the host monitor,
//! maps each scrape to canonical fields and appends the resulting samples to
//! the daily capture files.
//!

pub mod parser;

use std::future::Future;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, Timelike};
use headroom_capture::{
    buffer::Buffer,
    daily::{self, DailySink},
    sample::Sample,
};
use metrics::{counter, gauge};
use rustc_hash::FxHashMap;
use tracing::{debug, error, info, trace};

use crate::field_map::FieldMap;

const SCRAPE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
/// Errors produced by [`Prometheus`]
pub enum Error {
    /// The final flush at shutdown failed; buffered samples were lost.
    #[error("final flush failed: {0}")]
    Flush(#[from] daily::Error),
}

/// Map an exposition body to canonical fields.
///
/// Malformed lines, non-finite values and labelled lines no rule in `map`
/// matches are dropped. When the same field appears twice the later line
/// wins. Never fails: the worst case is an empty map.
#[must_use]
pub fn canonical_fields(text: &str, map: &FieldMap) -> FxHashMap<String, f64> {
    let mut fields = FxHashMap::default();

    for result in parser::parse_text(text) {
        let metric = match result {
            Ok(m) => m,
            Err(e) => {
                trace!("Failed to parse metric: {e}");
                continue;
            }
        };

        if !metric.value.is_finite() {
            trace!("Dropping non-finite value for {name}", name = metric.name);
            continue;
        }

        let field = match &metric.labels {
            None => map.unlabeled(metric.name),
            Some(labels) => {
                let Some(field) = map.labeled(metric.name, labels) else {
                    trace!("No field for labelled metric {name}", name = metric.name);
                    continue;
                };
                field
            }
        };

        fields.insert(field.to_string(), metric.value);
    }

    fields
}

/// The `Prometheus` recorder.
#[derive(Debug)]
pub struct Prometheus {
    client: reqwest::Client,
    uri: String,
    field_map: FieldMap,
    sample_period: Duration,
}

impl Prometheus {
    /// Create a new [`Prometheus`] instance scraping `uri` every
    /// `sample_period`.
    #[must_use]
    pub fn new(uri: String, field_map: FieldMap, sample_period: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            uri,
            field_map,
            sample_period,
        }
    }

    /// Fetch the endpoint once and map the body to canonical fields.
    ///
    /// Returns `None` when the endpoint is unreachable, times out, answers
    /// with anything but 200 or the body cannot be read. None of these is
    /// an error: the tick simply has no sample.
    pub async fn scrape(&self) -> Option<FxHashMap<String, f64>> {
        let uri = &self.uri;
        let Ok(resp) = self.client.get(uri).timeout(SCRAPE_TIMEOUT).send().await else {
            info!("failed to get Prometheus {uri}");
            counter!("headroom_scrape_failure").increment(1);
            return None;
        };

        if resp.status() != reqwest::StatusCode::OK {
            info!("Prometheus {uri} answered {status}", status = resp.status());
            counter!("headroom_scrape_failure").increment(1);
            return None;
        }

        let Ok(text) = resp.text().await else {
            info!("failed to read Prometheus response from {uri}");
            counter!("headroom_scrape_failure").increment(1);
            return None;
        };

        counter!("headroom_scrape_success").increment(1);
        Some(canonical_fields(&text, &self.field_map))
    }

    /// Run the recorder until `shutdown` resolves.
    ///
    /// Every tick scrapes once. A non-empty scrape becomes a sample stamped
    /// with the local wall-clock time and is pushed into `buffer`. The buffer
    /// is flushed to `sink` when it fills, when the calendar day changes and
    /// once more at shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error only if the final flush fails. Flush failures while
    /// running are logged and the samples stay buffered for the next try.
    pub async fn run<F>(
        self,
        buffer: &mut Buffer,
        sink: &mut DailySink,
        shutdown: F,
    ) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Prometheus recorder scraping {uri} at {period:?} interval into {dir}",
            uri = self.uri,
            period = self.sample_period,
            dir = sink.dir().display(),
        );

        tokio::pin!(shutdown);
        let mut poll = tokio::time::interval(self.sample_period);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    let Some(fields) = self.scrape().await else {
                        continue;
                    };
                    if fields.is_empty() {
                        debug!("scrape produced no fields, skipping tick");
                        continue;
                    }
                    accept(buffer, sink, Sample::from_values(now(), fields));
                }
                () = &mut shutdown => {
                    info!("shutdown signal received");
                    let written = sink.flush(buffer)?;
                    counter!("headroom_samples_flushed").increment(written as u64);
                    gauge!("headroom_buffer_depth").set(0.0);
                    return Ok(());
                }
            }
        }
    }
}

/// Local wall-clock time, truncated to whole seconds.
fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Push `sample`, flushing first if it starts a new calendar day and again
/// if the buffer fills.
pub(crate) fn accept(buffer: &mut Buffer, sink: &mut DailySink, sample: Sample) {
    let day_changed = buffer
        .pending()
        .last()
        .is_some_and(|last| last.timestamp.date() != sample.timestamp.date());
    if day_changed {
        debug!("calendar day changed, flushing");
        flush(buffer, sink);
    }

    if buffer.push(sample) {
        flush(buffer, sink);
    }
    gauge!("headroom_buffer_depth").set(buffer.len() as f64);
}

fn flush(buffer: &mut Buffer, sink: &mut DailySink) {
    match sink.flush(buffer) {
        Ok(written) => {
            counter!("headroom_samples_flushed").increment(written as u64);
        }
        Err(e) => {
            error!("failed to flush {pending} samples: {e}", pending = buffer.len());
        }
    }
}
