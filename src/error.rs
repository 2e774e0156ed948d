//! Error types for cassandra-producer

use thiserror::Error;

/// Main error type for producer operations
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration mapping could not be decoded
    #[error("invalid configuration: {0}")]
    Config(String),

    /// `connection()` called before a successful `initialize()`
    #[error("connection has not been initialized")]
    NotInitialized,

    /// Eager verification during `initialize()` failed
    #[error("error initializing connection: {0}")]
    Initialize(Box<Error>),

    /// Certificate supplied without its private key
    #[error("found certificate for TLS authentication but no private key")]
    MissingPrivateKey,

    /// PEM material could not be parsed into a certificate bundle
    #[error("failed to parse certificate bundle: {0}")]
    CertificateBundle(String),

    /// Client TLS configuration could not be derived from a parsed bundle
    #[error("failed to get TLS configuration: {0}")]
    TlsConfiguration(String),

    /// Unknown `tls_min_version` name
    #[error("invalid 'tls_min_version' in config")]
    InvalidTlsMinVersion,

    /// Unknown consistency level name
    #[error("invalid consistency {0:?}")]
    InvalidConsistency(String),

    /// The driver failed to establish a session
    #[error("error creating session: {0}")]
    CreateSession(String),

    /// The post-connect validation query failed
    #[error("error validating connection info: {0}")]
    Validation(String),

    /// Raw failure reported by the cluster driver
    #[error("driver error: {0}")]
    Driver(String),

    /// Session factory stepped out of order
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },
}

impl Error {
    /// Stable label for the error, used as a metrics dimension
    pub fn category(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::NotInitialized => "not_initialized",
            Error::Initialize(inner) => inner.category(),
            Error::MissingPrivateKey
            | Error::CertificateBundle(_)
            | Error::TlsConfiguration(_)
            | Error::InvalidTlsMinVersion => "tls",
            Error::InvalidConsistency(_) => "consistency",
            Error::CreateSession(_) => "create_session",
            Error::Validation(_) => "validation",
            Error::Driver(_) => "driver",
            Error::InvalidState { .. } => "state",
        }
    }

    /// Whether the failure happened before any network I/O was attempted
    pub fn is_local(&self) -> bool {
        if let Error::Initialize(inner) = self {
            return inner.is_local();
        }

        matches!(
            self,
            Error::Config(_)
                | Error::NotInitialized
                | Error::MissingPrivateKey
                | Error::CertificateBundle(_)
                | Error::TlsConfiguration(_)
                | Error::InvalidTlsMinVersion
                | Error::InvalidState { .. }
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
