//! Producer configuration
//!
//! The hosting backend hands over an untyped key/value mapping; this module
//! turns it into a typed [`CassandraConfig`].

mod record;

pub use record::{CassandraConfig, DEFAULT_PORT, DEFAULT_PROTOCOL_VERSION};
