//! Counter helpers

use super::labels;

/// A session was built and passed validation
pub fn session_created(tls: bool) {
    let mode = if tls {
        labels::TLS_ENABLED
    } else {
        labels::TLS_DISABLED
    };
    ::metrics::counter!(labels::SESSIONS_CREATED, labels::TLS => mode).increment(1);
}

/// A session attempt failed at `stage` with an error of `category`
pub fn session_failed(stage: &'static str, category: &'static str) {
    ::metrics::counter!(
        labels::SESSION_FAILURES,
        labels::STAGE => stage,
        labels::ERROR => category
    )
    .increment(1);
}

/// `connection()` returned the cached session
pub fn cache_hit() {
    ::metrics::counter!(labels::SESSION_CACHE_HITS).increment(1);
}

/// A cached session was released
pub fn session_closed() {
    ::metrics::counter!(labels::SESSIONS_CLOSED).increment(1);
}
