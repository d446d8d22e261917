//! Fetch metrics from the monitored host
//!
//! This module scrapes the exporter running on the host and turns each scrape
//! into a canonical [`headroom_capture::sample::Sample`].

pub mod prometheus;
