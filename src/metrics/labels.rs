//! Metric names and label values

/// Sessions successfully built and validated
pub const SESSIONS_CREATED: &str = "cassandra_producer_sessions_created_total";
/// Session construction attempts that failed, labelled by stage
pub const SESSION_FAILURES: &str = "cassandra_producer_session_failures_total";
/// `connection()` calls answered from the cache
pub const SESSION_CACHE_HITS: &str = "cassandra_producer_session_cache_hits_total";
/// Cached sessions released by `close()` or re-initialization
pub const SESSIONS_CLOSED: &str = "cassandra_producer_sessions_closed_total";
/// Time from factory entry to a validated session
pub const SESSION_SETUP_DURATION: &str = "cassandra_producer_session_setup_duration_ms";

/// Label key for the failing factory stage
pub const STAGE: &str = "stage";
/// Label key for TLS mode
pub const TLS: &str = "tls";
/// Error category label key
pub const ERROR: &str = "error";

pub const TLS_ENABLED: &str = "enabled";
pub const TLS_DISABLED: &str = "disabled";
