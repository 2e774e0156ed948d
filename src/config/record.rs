//! Configuration record decoded from an untyped mapping
//!
//! Recognized keys:
//! * `hosts` — comma-separated contact points, `host[:port]`
//! * `username`, `password`
//! * `tls`, `insecure_tls`
//! * `certificate`, `private_key`, `issuing_ca` — PEM text
//! * `protocol_version`, `connect_timeout` (seconds)
//! * `tls_min_version`, `consistency`

use crate::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Default CQL native protocol port
pub const DEFAULT_PORT: u16 = 9042;

/// Protocol version used when the record leaves it at zero
pub const DEFAULT_PROTOCOL_VERSION: u8 = 2;

/// Cassandra connection settings
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CassandraConfig {
    /// Comma-separated contact points
    pub hosts: String,
    /// Username for password authentication
    pub username: String,
    /// Password for password authentication
    pub password: String,
    /// Whether to use TLS
    pub tls: bool,
    /// Skip peer certificate verification
    pub insecure_tls: bool,
    /// Client certificate (PEM)
    pub certificate: String,
    /// Client private key (PEM)
    pub private_key: String,
    /// Issuing CA certificate(s) (PEM)
    pub issuing_ca: String,
    /// CQL protocol version (0 = default)
    pub protocol_version: u8,
    /// Connect timeout in seconds (0 = driver default)
    pub connect_timeout: u64,
    /// Minimum TLS version name, e.g. `tls12`
    pub tls_min_version: String,
    /// Default consistency level name, e.g. `QUORUM`
    pub consistency: String,
}

/// Keys present in an incoming mapping; absent keys stay `None`.
#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    hosts: Option<String>,
    username: Option<String>,
    password: Option<String>,
    tls: Option<bool>,
    insecure_tls: Option<bool>,
    certificate: Option<String>,
    private_key: Option<String>,
    issuing_ca: Option<String>,
    protocol_version: Option<u8>,
    connect_timeout: Option<u64>,
    tls_min_version: Option<String>,
    consistency: Option<String>,
}

impl CassandraConfig {
    /// Decode a fresh record from a configuration mapping
    pub fn from_map(conf: &Map<String, Value>) -> Result<Self> {
        let mut config = Self::default();
        config.merge(conf)?;
        Ok(config)
    }

    /// Merge a configuration mapping into this record.
    ///
    /// Keys missing from `conf` keep their current value and unknown keys are
    /// ignored. A type mismatch on any key rejects the whole mapping and leaves
    /// the record unchanged.
    pub fn merge(&mut self, conf: &Map<String, Value>) -> Result<()> {
        let patch: ConfigPatch = serde_json::from_value(Value::Object(conf.clone()))
            .map_err(|e| Error::Config(e.to_string()))?;

        if let Some(hosts) = patch.hosts {
            self.hosts = hosts;
        }
        if let Some(username) = patch.username {
            self.username = username;
        }
        if let Some(password) = patch.password {
            self.password = password;
        }
        if let Some(tls) = patch.tls {
            self.tls = tls;
        }
        if let Some(insecure_tls) = patch.insecure_tls {
            self.insecure_tls = insecure_tls;
        }
        if let Some(certificate) = patch.certificate {
            self.certificate = certificate;
        }
        if let Some(private_key) = patch.private_key {
            self.private_key = private_key;
        }
        if let Some(issuing_ca) = patch.issuing_ca {
            self.issuing_ca = issuing_ca;
        }
        if let Some(protocol_version) = patch.protocol_version {
            self.protocol_version = protocol_version;
        }
        if let Some(connect_timeout) = patch.connect_timeout {
            self.connect_timeout = connect_timeout;
        }
        if let Some(tls_min_version) = patch.tls_min_version {
            self.tls_min_version = tls_min_version;
        }
        if let Some(consistency) = patch.consistency {
            self.consistency = consistency;
        }

        Ok(())
    }

    /// Contact points with the default port filled in
    pub fn host_list(&self) -> Vec<String> {
        self.hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(with_default_port)
            .collect()
    }

    /// Protocol version to request, defaulting to 2
    pub fn effective_protocol_version(&self) -> u8 {
        if self.protocol_version == 0 {
            DEFAULT_PROTOCOL_VERSION
        } else {
            self.protocol_version
        }
    }

    /// Connect timeout, `None` leaves the driver default in place
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout > 0).then(|| Duration::from_secs(self.connect_timeout))
    }
}

impl std::fmt::Debug for CassandraConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CassandraConfig")
            .field("hosts", &self.hosts)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("tls", &self.tls)
            .field("insecure_tls", &self.insecure_tls)
            .field("certificate", &present(&self.certificate))
            .field("private_key", &redacted(&self.private_key))
            .field("issuing_ca", &present(&self.issuing_ca))
            .field("protocol_version", &self.protocol_version)
            .field("connect_timeout", &self.connect_timeout)
            .field("tls_min_version", &self.tls_min_version)
            .field("consistency", &self.consistency)
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

fn present(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "<pem>"
    }
}

/// Append `:9042` unless the host already names a port
fn with_default_port(host: &str) -> String {
    if let Some(rest) = host.strip_prefix('[') {
        // Bracketed IPv6: `[::1]` or `[::1]:9043`
        return match rest.split_once(']') {
            Some((_, tail)) if tail.starts_with(':') => host.to_string(),
            _ => format!("{}:{}", host, DEFAULT_PORT),
        };
    }

    match host.matches(':').count() {
        0 => format!("{}:{}", host, DEFAULT_PORT),
        1 => host.to_string(),
        // Bare IPv6 literal
        _ => format!("[{}]:{}", host, DEFAULT_PORT),
    }
}
