//! Session construction
//!
//! This module handles:
//! * Cluster topology and credentials
//! * TLS material parsing and client security settings
//! * Consistency and TLS version translation
//! * The driver seam and its scylla implementation
//! * Session creation and validation

mod cluster;
mod consistency;
mod driver;
mod factory;
mod state;
mod tls;

pub use cluster::{ClusterConfig, PasswordAuthenticator, SslOptions};
pub use consistency::Consistency;
pub use driver::{ClusterDriver, ClusterSession, ScyllaDriver, ScyllaSession};
pub use factory::{cluster_config, ssl_options, SessionFactory, VALIDATION_QUERY};
pub(crate) use factory::close_quietly;
pub use state::SessionState;
pub use tls::{
    lookup_tls_version, resolve_bundle, ParsedBundle, TlsMaterial, TlsSettings, VERSION_TLS10,
    VERSION_TLS11, VERSION_TLS12, VERSION_TLS13,
};
