//! The headroom metrics recorder and capacity report.
//!
//! This library supports the headroom binary found elsewhere in this project.
//! It scrapes the Prometheus endpoint that `mactop` exposes, hands samples to
//! [`headroom_capture`] for persistence and turns captured days back into a
//! statistical report.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::multiple_crate_versions)]

pub mod analysis;
pub mod config;
pub mod field_map;
pub mod report;
pub mod target_metrics;
