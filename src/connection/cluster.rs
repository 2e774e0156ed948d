//! Cluster topology handed to a driver

use super::tls::TlsSettings;
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::Duration;

/// Credentials for password authentication.
///
/// Empty strings are passed through; the cluster decides whether they are valid.
#[derive(Clone, Default)]
pub struct PasswordAuthenticator {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for PasswordAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordAuthenticator")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// TLS attached to a cluster
pub struct SslOptions {
    /// Security settings derived from certificate material, `None` when the
    /// driver's default trust behaviour applies
    pub settings: Option<TlsSettings>,
    /// Compiled rustls configuration handed to the driver
    pub client_config: Arc<ClientConfig>,
}

impl std::fmt::Debug for SslOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SslOptions")
            .field("settings", &self.settings)
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Everything a driver needs to open a session
#[derive(Debug)]
pub struct ClusterConfig {
    /// Contact points, `host:port`
    pub hosts: Vec<String>,
    pub authenticator: PasswordAuthenticator,
    /// CQL native protocol version
    pub protocol_version: u8,
    /// `None` keeps the driver default
    pub connect_timeout: Option<Duration>,
    /// `None` means plaintext
    pub ssl_opts: Option<SslOptions>,
}

impl ClusterConfig {
    /// Plaintext cluster with default settings
    pub fn new(hosts: Vec<String>) -> Self {
        Self {
            hosts,
            authenticator: PasswordAuthenticator::default(),
            protocol_version: crate::config::DEFAULT_PROTOCOL_VERSION,
            connect_timeout: None,
            ssl_opts: None,
        }
    }

    /// Whether TLS will be used
    pub fn tls_enabled(&self) -> bool {
        self.ssl_opts.is_some()
    }
}
