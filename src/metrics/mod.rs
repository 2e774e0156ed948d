//! Metrics emitted by the producer
//!
//! Everything goes through the `metrics` facade; nothing is recorded unless the
//! hosting process installs a recorder.

pub mod counters;
pub mod histograms;
pub mod labels;
