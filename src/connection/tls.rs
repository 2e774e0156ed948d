//! TLS material handling for Cassandra sessions.
//!
//! The producer receives certificate, private key and issuing CA as PEM text.
//! This module validates which of those were supplied ([`TlsMaterial`]),
//! parses them ([`ParsedBundle`]), and derives client-mode transport security
//! settings ([`TlsSettings`]) that compile down to a rustls `ClientConfig`.

use crate::config::CassandraConfig;
use crate::{Error, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls::{SupportedProtocolVersion, ALL_VERSIONS};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use sha2::Digest;
use std::sync::Arc;

/// TLS 1.0 protocol constant
pub const VERSION_TLS10: u16 = 0x0301;
/// TLS 1.1 protocol constant
pub const VERSION_TLS11: u16 = 0x0302;
/// TLS 1.2 protocol constant
pub const VERSION_TLS12: u16 = 0x0303;
/// TLS 1.3 protocol constant
pub const VERSION_TLS13: u16 = 0x0304;

/// Accepted `tls_min_version` names
const TLS_LOOKUP: &[(&str, u16)] = &[
    ("tls10", VERSION_TLS10),
    ("tls11", VERSION_TLS11),
    ("tls12", VERSION_TLS12),
    ("tls13", VERSION_TLS13),
];

/// Translate a `tls_min_version` name into its protocol constant.
///
/// # Errors
///
/// Returns [`Error::InvalidTlsMinVersion`] for names outside the lookup table.
pub fn lookup_tls_version(name: &str) -> Result<u16> {
    TLS_LOOKUP
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
        .ok_or(Error::InvalidTlsMinVersion)
}

/// Which pieces of PEM material were supplied.
///
/// A certificate is only ever accepted together with its private key.
#[derive(Clone, PartialEq, Eq)]
pub enum TlsMaterial {
    /// Neither a client certificate nor an issuing CA
    None,
    /// Client certificate and key, system trust roots
    CertKeyPair {
        certificate: String,
        private_key: String,
    },
    /// Custom trust roots, no client authentication
    IssuingCaOnly { issuing_ca: String },
    /// Client certificate and key with custom trust roots
    CertKeyPairWithCa {
        certificate: String,
        private_key: String,
        issuing_ca: String,
    },
}

impl TlsMaterial {
    /// Classify raw PEM fields. Empty strings count as absent.
    ///
    /// A private key without a certificate is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPrivateKey`] if a certificate is given without a key.
    pub fn from_parts(certificate: &str, private_key: &str, issuing_ca: &str) -> Result<Self> {
        if !certificate.is_empty() && private_key.is_empty() {
            return Err(Error::MissingPrivateKey);
        }

        let material = match (certificate.is_empty(), issuing_ca.is_empty()) {
            (true, true) => Self::None,
            (true, false) => Self::IssuingCaOnly {
                issuing_ca: issuing_ca.to_string(),
            },
            (false, true) => Self::CertKeyPair {
                certificate: certificate.to_string(),
                private_key: private_key.to_string(),
            },
            (false, false) => Self::CertKeyPairWithCa {
                certificate: certificate.to_string(),
                private_key: private_key.to_string(),
                issuing_ca: issuing_ca.to_string(),
            },
        };
        Ok(material)
    }

    /// Classify the PEM fields of a configuration record
    pub fn from_config(config: &CassandraConfig) -> Result<Self> {
        Self::from_parts(
            &config.certificate,
            &config.private_key,
            &config.issuing_ca,
        )
    }

    /// True when there is nothing to build a security configuration from
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    fn key_pair(&self) -> Option<(&str, &str)> {
        match self {
            Self::CertKeyPair {
                certificate,
                private_key,
            }
            | Self::CertKeyPairWithCa {
                certificate,
                private_key,
                ..
            } => Some((certificate, private_key)),
            _ => None,
        }
    }

    fn issuing_ca(&self) -> Option<&str> {
        match self {
            Self::IssuingCaOnly { issuing_ca } | Self::CertKeyPairWithCa { issuing_ca, .. } => {
                Some(issuing_ca)
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("TlsMaterial::None"),
            Self::CertKeyPair { .. } => f.write_str("TlsMaterial::CertKeyPair"),
            Self::IssuingCaOnly { .. } => f.write_str("TlsMaterial::IssuingCaOnly"),
            Self::CertKeyPairWithCa { .. } => f.write_str("TlsMaterial::CertKeyPairWithCa"),
        }
    }
}

/// Client certificate chain and its private key
struct ClientIdentity {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

/// Decoded certificate bundle
pub struct ParsedBundle {
    certificates: Vec<CertificateDer<'static>>,
    private_key: Option<PrivateKeyDer<'static>>,
    ca_chain: Vec<CertificateDer<'static>>,
}

impl ParsedBundle {
    /// Parse whichever PEM blocks the material carries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CertificateBundle`] if any block is malformed or empty.
    pub fn parse(material: &TlsMaterial) -> Result<Self> {
        let mut bundle = ParsedBundle {
            certificates: Vec::new(),
            private_key: None,
            ca_chain: Vec::new(),
        };

        if let Some((certificate, private_key)) = material.key_pair() {
            bundle.certificates = parse_certificates(certificate, "certificate")?;
            bundle.private_key = Some(parse_private_key(private_key)?);
        }

        if let Some(issuing_ca) = material.issuing_ca() {
            bundle.ca_chain = parse_certificates(issuing_ca, "issuing CA")?;
        }

        Ok(bundle)
    }

    /// SHA-256 fingerprint of the leaf client certificate, hex encoded
    pub fn certificate_fingerprint(&self) -> Option<String> {
        self.certificates
            .first()
            .map(|cert| hex::encode(sha2::Sha256::digest(cert.as_ref())))
    }

    /// Derive client-mode settings from the bundle.
    ///
    /// The client chain is the certificate followed by the CA chain, and the CA
    /// chain doubles as the trust roots. The minimum version defaults to TLS 1.2.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TlsConfiguration`] if the settings cannot be compiled
    /// into a rustls client configuration.
    pub fn client_settings(&self) -> Result<TlsSettings> {
        let identity = match &self.private_key {
            Some(key) if !self.certificates.is_empty() => {
                let mut chain = self.certificates.clone();
                chain.extend(self.ca_chain.iter().cloned());
                Some(ClientIdentity {
                    chain,
                    key: key.clone_key(),
                })
            }
            _ => None,
        };

        let mut settings = TlsSettings {
            identity,
            roots: self.ca_chain.clone(),
            insecure_skip_verify: false,
            min_version: VERSION_TLS12,
            compiled: None,
        };

        match settings.build_client_config() {
            Ok(config) => settings.compiled = Some(settings.compile_key(Arc::new(config))),
            Err(e) => {
                return Err(Error::TlsConfiguration(format!(
                    "tlsConfig:{:?} err:{}",
                    settings, e
                )))
            }
        }

        Ok(settings)
    }
}

fn parse_certificates(pem: &str, what: &str) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = std::io::Cursor::new(pem.as_bytes());
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::CertificateBundle(format!("invalid {} PEM: {}", what, e)))?;

    if certs.is_empty() {
        return Err(Error::CertificateBundle(format!(
            "no certificates found in {}",
            what
        )));
    }
    Ok(certs)
}

fn parse_private_key(pem: &str) -> Result<PrivateKeyDer<'static>> {
    let mut reader = std::io::Cursor::new(pem.as_bytes());
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Error::CertificateBundle(format!("invalid private key PEM: {}", e)))?
        .ok_or_else(|| Error::CertificateBundle("no private key found in private_key".into()))
}

/// Parse the material and derive client settings in one step.
pub fn resolve_bundle(material: &TlsMaterial) -> Result<TlsSettings> {
    let bundle = ParsedBundle::parse(material)?;
    if let Some(fingerprint) = bundle.certificate_fingerprint() {
        tracing::debug!(sha256 = %fingerprint, "parsed client certificate");
    }
    bundle.client_settings()
}

/// Transport security settings for one session.
///
/// Equivalent of a client TLS configuration before it is handed to the driver.
/// `min_version` of `0` means no floor beyond what rustls supports.
pub struct TlsSettings {
    identity: Option<ClientIdentity>,
    /// Empty means system trust roots
    roots: Vec<CertificateDer<'static>>,
    /// Skip peer certificate verification
    pub insecure_skip_verify: bool,
    /// Minimum protocol version constant, `0` when unset
    pub min_version: u16,
    compiled: Option<CompiledConfig>,
}

/// A compiled rustls config and the settings it was compiled under
struct CompiledConfig {
    insecure_skip_verify: bool,
    tls13_only: bool,
    config: Arc<ClientConfig>,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            identity: None,
            roots: Vec::new(),
            insecure_skip_verify: false,
            min_version: 0,
            compiled: None,
        }
    }
}

impl TlsSettings {
    /// Whether a client certificate will be presented
    pub fn has_client_identity(&self) -> bool {
        self.identity.is_some()
    }

    /// Whether trust roots come from the issuing CA instead of the system store
    pub fn has_custom_roots(&self) -> bool {
        !self.roots.is_empty()
    }

    /// Protocol versions rustls may negotiate under the current floor.
    ///
    /// rustls only implements TLS 1.2 and 1.3, so any floor up to 1.2 allows both.
    pub fn protocol_versions(&self) -> Vec<&'static SupportedProtocolVersion> {
        if self.tls13_only() {
            vec![&rustls::version::TLS13]
        } else {
            ALL_VERSIONS.to_vec()
        }
    }

    /// Compile into a rustls client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TlsConfiguration`] if rustls rejects the settings.
    ///
    /// The config compiled while resolving the bundle is reused as long as
    /// `insecure_skip_verify` and the effective protocol floor are unchanged.
    pub fn client_config(&self) -> Result<Arc<ClientConfig>> {
        if let Some(compiled) = &self.compiled {
            if compiled.insecure_skip_verify == self.insecure_skip_verify
                && compiled.tls13_only == self.tls13_only()
            {
                return Ok(Arc::clone(&compiled.config));
            }
        }

        self.build_client_config()
            .map(Arc::new)
            .map_err(|e| Error::TlsConfiguration(e.to_string()))
    }

    fn tls13_only(&self) -> bool {
        self.min_version >= VERSION_TLS13
    }

    fn compile_key(&self, config: Arc<ClientConfig>) -> CompiledConfig {
        CompiledConfig {
            insecure_skip_verify: self.insecure_skip_verify,
            tls13_only: self.tls13_only(),
            config,
        }
    }

    fn build_client_config(&self) -> std::result::Result<ClientConfig, rustls::Error> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let builder =
            ClientConfig::builder_with_provider(provider).with_protocol_versions(&self.protocol_versions())?;

        let builder = if self.insecure_skip_verify {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AllowAllVerifier))
        } else {
            builder.with_root_certificates(self.root_store()?)
        };

        match &self.identity {
            Some(identity) => {
                builder.with_client_auth_cert(identity.chain.clone(), identity.key.clone_key())
            }
            None => Ok(builder.with_no_client_auth()),
        }
    }

    fn root_store(&self) -> std::result::Result<RootCertStore, rustls::Error> {
        let mut store = RootCertStore::empty();

        if !self.roots.is_empty() {
            for cert in &self.roots {
                store.add(cert.clone())?;
            }
            return Ok(store);
        }

        let result = rustls_native_certs::load_native_certs();
        let (added, _ignored) = store.add_parsable_certificates(result.certs);
        if !result.errors.is_empty() {
            tracing::debug!(
                "some system certificates could not be loaded: {:?}",
                result.errors
            );
        }

        if added == 0 {
            tracing::debug!("no system root certificates, using bundled webpki roots");
            store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }

        Ok(store)
    }
}

impl std::fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsSettings")
            .field(
                "client_chain_len",
                &self.identity.as_ref().map(|i| i.chain.len()),
            )
            .field("custom_roots", &self.roots.len())
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("min_version", &format_args!("{:#06x}", self.min_version))
            .finish()
    }
}

/// Accepts any server certificate. Used only for `insecure_tls`.
#[derive(Debug)]
struct AllowAllVerifier;

impl ServerCertVerifier for AllowAllVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT_CERT: &str = include_str!("../../tests/fixtures/client.pem");
    const CLIENT_KEY: &str = include_str!("../../tests/fixtures/client.key");
    const CA_CERT: &str = include_str!("../../tests/fixtures/ca.pem");

    #[test]
    fn test_lookup_tls_version() {
        assert_eq!(lookup_tls_version("tls10").unwrap(), 0x0301);
        assert_eq!(lookup_tls_version("tls11").unwrap(), 0x0302);
        assert_eq!(lookup_tls_version("tls12").unwrap(), 0x0303);
        assert_eq!(lookup_tls_version("tls13").unwrap(), 0x0304);
    }

    #[test]
    fn test_lookup_tls_version_invalid() {
        assert!(matches!(
            lookup_tls_version("tls14"),
            Err(Error::InvalidTlsMinVersion)
        ));
        assert!(matches!(
            lookup_tls_version("TLS12"),
            Err(Error::InvalidTlsMinVersion)
        ));
        assert!(lookup_tls_version("").is_err());
    }

    #[test]
    fn test_material_certificate_without_key() {
        let err = TlsMaterial::from_parts("CERT", "", "").unwrap_err();
        assert_eq!(
            err.to_string(),
            "found certificate for TLS authentication but no private key"
        );

        let err = TlsMaterial::from_parts("CERT", "", "CA").unwrap_err();
        assert!(matches!(err, Error::MissingPrivateKey));
    }

    #[test]
    fn test_material_variants() {
        assert_eq!(TlsMaterial::from_parts("", "", "").unwrap(), TlsMaterial::None);
        assert!(matches!(
            TlsMaterial::from_parts("", "", "CA").unwrap(),
            TlsMaterial::IssuingCaOnly { .. }
        ));
        assert!(matches!(
            TlsMaterial::from_parts("CERT", "KEY", "").unwrap(),
            TlsMaterial::CertKeyPair { .. }
        ));
        assert!(matches!(
            TlsMaterial::from_parts("CERT", "KEY", "CA").unwrap(),
            TlsMaterial::CertKeyPairWithCa { .. }
        ));
    }

    #[test]
    fn test_material_key_without_certificate_ignored() {
        assert_eq!(TlsMaterial::from_parts("", "KEY", "").unwrap(), TlsMaterial::None);
        assert!(matches!(
            TlsMaterial::from_parts("", "KEY", "CA").unwrap(),
            TlsMaterial::IssuingCaOnly { .. }
        ));
    }

    #[test]
    fn test_parse_full_bundle() {
        let material = TlsMaterial::from_parts(CLIENT_CERT, CLIENT_KEY, CA_CERT).unwrap();
        let bundle = ParsedBundle::parse(&material).expect("parse bundle");
        assert_eq!(bundle.certificates.len(), 1);
        assert!(bundle.private_key.is_some());
        assert_eq!(bundle.ca_chain.len(), 1);

        let fingerprint = bundle.certificate_fingerprint().unwrap();
        assert_eq!(fingerprint.len(), 64);
    }

    #[test]
    fn test_parse_garbage_certificate() {
        let material = TlsMaterial::from_parts("not a pem", CLIENT_KEY, "").unwrap();
        let err = ParsedBundle::parse(&material).err().unwrap();
        assert!(matches!(err, Error::CertificateBundle(_)));
        assert!(err
            .to_string()
            .starts_with("failed to parse certificate bundle"));
    }

    #[test]
    fn test_parse_garbage_private_key() {
        let material = TlsMaterial::from_parts(CLIENT_CERT, "not a key", "").unwrap();
        let err = ParsedBundle::parse(&material).err().unwrap();
        assert!(matches!(err, Error::CertificateBundle(_)));
    }

    #[test]
    fn test_parse_garbage_issuing_ca() {
        let material = TlsMaterial::from_parts("", "", "garbage").unwrap();
        assert!(matches!(
            ParsedBundle::parse(&material),
            Err(Error::CertificateBundle(_))
        ));
    }

    #[test]
    fn test_resolve_bundle_defaults() {
        let material = TlsMaterial::from_parts(CLIENT_CERT, CLIENT_KEY, CA_CERT).unwrap();
        let settings = resolve_bundle(&material).expect("resolve bundle");

        assert!(settings.has_client_identity());
        assert!(settings.has_custom_roots());
        assert!(!settings.insecure_skip_verify);
        assert_eq!(settings.min_version, VERSION_TLS12);
    }

    #[test]
    fn test_resolve_ca_only() {
        let material = TlsMaterial::from_parts("", "", CA_CERT).unwrap();
        let settings = resolve_bundle(&material).expect("resolve bundle");

        assert!(!settings.has_client_identity());
        assert!(settings.has_custom_roots());
        assert!(settings.client_config().is_ok());
    }

    #[test]
    fn test_resolve_cert_key_uses_system_roots() {
        let material = TlsMaterial::from_parts(CLIENT_CERT, CLIENT_KEY, "").unwrap();
        let settings = resolve_bundle(&material).expect("resolve bundle");

        assert!(settings.has_client_identity());
        assert!(!settings.has_custom_roots());
    }

    #[test]
    fn test_resolve_undecodable_issuing_ca() {
        let garbage_ca = "-----BEGIN CERTIFICATE-----\nAAAAAAAAAAAAAAAA\n-----END CERTIFICATE-----\n";
        let material = TlsMaterial::from_parts("", "", garbage_ca).unwrap();

        let err = resolve_bundle(&material).err().unwrap();
        assert!(matches!(err, Error::TlsConfiguration(_)));

        let message = err.to_string();
        assert!(message.starts_with("failed to get TLS configuration: tlsConfig:TlsSettings"));
        assert!(message.contains("custom_roots: 1"));
        assert!(message.contains(" err:"));
    }

    #[test]
    fn test_resolve_mismatched_key_pair() {
        // The CA certificate was not issued for the client key.
        let material = TlsMaterial::from_parts(CA_CERT, CLIENT_KEY, "").unwrap();

        let err = resolve_bundle(&material).err().unwrap();
        assert!(matches!(err, Error::TlsConfiguration(_)));
        assert!(err
            .to_string()
            .starts_with("failed to get TLS configuration: tlsConfig:"));
    }

    #[test]
    fn test_resolved_config_is_reused() {
        let material = TlsMaterial::from_parts(CLIENT_CERT, CLIENT_KEY, CA_CERT).unwrap();
        let mut settings = resolve_bundle(&material).unwrap();

        let first = settings.client_config().unwrap();
        settings.min_version = 0;
        let second = settings.client_config().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        settings.min_version = VERSION_TLS13;
        let tls13 = settings.client_config().unwrap();
        assert!(!Arc::ptr_eq(&first, &tls13));

        settings.min_version = VERSION_TLS12;
        settings.insecure_skip_verify = true;
        let insecure = settings.client_config().unwrap();
        assert!(!Arc::ptr_eq(&first, &insecure));
    }

    #[test]
    fn test_default_settings_build() {
        let settings = TlsSettings::default();
        assert_eq!(settings.min_version, 0);
        assert!(settings.client_config().is_ok());
    }

    #[test]
    fn test_insecure_settings_build() {
        let settings = TlsSettings {
            insecure_skip_verify: true,
            ..Default::default()
        };
        assert!(settings.client_config().is_ok());
    }

    #[test]
    fn test_protocol_versions_follow_floor() {
        let mut settings = TlsSettings::default();
        assert_eq!(settings.protocol_versions().len(), ALL_VERSIONS.len());

        settings.min_version = VERSION_TLS10;
        assert_eq!(settings.protocol_versions().len(), ALL_VERSIONS.len());

        settings.min_version = VERSION_TLS13;
        let versions = settings.protocol_versions();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, rustls::ProtocolVersion::TLSv1_3);
        assert!(settings.client_config().is_ok());
    }

    #[test]
    fn test_tls_settings_debug() {
        let material = TlsMaterial::from_parts(CLIENT_CERT, CLIENT_KEY, CA_CERT).unwrap();
        let settings = resolve_bundle(&material).unwrap();

        let debug_str = format!("{:?}", settings);
        assert!(debug_str.contains("TlsSettings"));
        assert!(debug_str.contains("0x0303"));
        assert!(!debug_str.contains("PRIVATE KEY"));
    }

    #[test]
    fn test_material_debug_hides_pem() {
        let material = TlsMaterial::from_parts(CLIENT_CERT, CLIENT_KEY, "").unwrap();
        let debug_str = format!("{:?}", material);
        assert_eq!(debug_str, "TlsMaterial::CertKeyPair");
    }
}
