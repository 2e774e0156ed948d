//! Histogram helpers

use super::labels;

/// Record how long building and validating a session took
pub fn session_setup_duration(millis: u64) {
    ::metrics::histogram!(labels::SESSION_SETUP_DURATION).record(millis as f64);
}
