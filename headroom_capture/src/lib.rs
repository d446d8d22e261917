//! Crate regarding headroom's 'capture' files
//!
//! A capture is a set of daily CSV files, one row per sample scraped from the
//! monitoring tool. This crate owns the in-memory sample model, writing rows
//! out, and reading batches of rows back into a single [`dataset::Dataset`].

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::perf)]
#![deny(clippy::suspicious)]
#![deny(clippy::complexity)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]

pub mod buffer;
pub mod daily;
pub mod dataset;
pub mod load;
pub mod sample;
pub mod timestamp;
pub mod validate;
pub mod writer;
