//! Session construction
//!
//! [`SessionFactory::create_session`] walks one attempt through
//! [`SessionState`]: cluster topology, optional TLS, driver session,
//! default consistency, and a validation query. Every TLS problem is detected
//! before the driver is asked to connect.

use super::cluster::{ClusterConfig, PasswordAuthenticator, SslOptions};
use super::consistency::Consistency;
use super::driver::{ClusterDriver, ClusterSession};
use super::state::SessionState;
use super::tls::{lookup_tls_version, resolve_bundle, TlsMaterial, TlsSettings};
use crate::config::CassandraConfig;
use crate::{Error, Result};
use std::time::Instant;
use tracing::Instrument;

/// Administrative query proving the credentials can reach the cluster
pub const VALIDATION_QUERY: &str = "LIST USERS";

/// Builds validated sessions through a [`ClusterDriver`]
#[derive(Debug, Default)]
pub struct SessionFactory<D> {
    driver: D,
}

impl<D: ClusterDriver> SessionFactory<D> {
    /// Create a factory over `driver`
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    /// Build, configure and validate a session for `config`.
    ///
    /// # Errors
    ///
    /// * TLS assembly errors, before any network call
    /// * [`Error::CreateSession`] if the driver cannot connect
    /// * [`Error::InvalidConsistency`] for an unknown consistency name
    /// * [`Error::Validation`] if the validation query fails
    ///
    /// A session that was created but failed a later step is closed before
    /// the error is returned.
    pub async fn create_session(&self, config: &CassandraConfig) -> Result<D::Session> {
        let started = Instant::now();
        let mut state = SessionState::Unbuilt;

        let result = self
            .build(config, &mut state)
            .instrument(tracing::info_span!(
                "create_session",
                hosts = %config.hosts,
                tls = config.tls
            ))
            .await;

        match &result {
            Ok(_) => {
                crate::metrics::counters::session_created(config.tls);
                crate::metrics::histograms::session_setup_duration(
                    started.elapsed().as_millis() as u64,
                );
            }
            Err(e) => {
                crate::metrics::counters::session_failed(state.failure_stage(), e.category());
                tracing::debug!(
                    state = %state,
                    local = e.is_local(),
                    error = %e,
                    "session attempt failed"
                );
                if !state.is_terminal() {
                    state.transition(SessionState::Failed)?;
                }
            }
        }

        result
    }

    async fn build(&self, config: &CassandraConfig, state: &mut SessionState) -> Result<D::Session> {
        let mut cluster = cluster_config(config)?;
        state.transition(SessionState::ClusterConfigured)?;

        if config.tls {
            cluster.ssl_opts = Some(ssl_options(config)?);
            state.transition(SessionState::TlsConfigured)?;
        } else {
            state.transition(SessionState::TlsSkipped)?;
        }

        let mut session = self
            .driver
            .create_session(&cluster)
            .await
            .map_err(|e| Error::CreateSession(driver_message(e)))?;
        state.transition(SessionState::SessionCreated)?;
        tracing::debug!("session created");

        if !config.consistency.is_empty() {
            match config.consistency.parse::<Consistency>() {
                Ok(consistency) => {
                    if consistency.is_serial() {
                        tracing::warn!(
                            consistency = %consistency,
                            "serial consistency set as session default; plain writes will be rejected"
                        );
                    }
                    session.set_consistency(consistency);
                }
                Err(e) => {
                    close_quietly(&session, "invalid consistency").await;
                    return Err(e);
                }
            }
        }
        state.transition(SessionState::ConsistencyApplied)?;

        if let Err(e) = session.execute(VALIDATION_QUERY).await {
            close_quietly(&session, "validation failed").await;
            return Err(Error::Validation(driver_message(e)));
        }
        state.transition(SessionState::Validated)?;

        tracing::info!("session validated");
        Ok(session)
    }
}

/// Topology, credentials, protocol version and timeout for `config`.
///
/// TLS is left unset; see [`ssl_options`].
pub fn cluster_config(config: &CassandraConfig) -> Result<ClusterConfig> {
    let hosts = config.host_list();
    if hosts.is_empty() {
        return Err(Error::CreateSession("no hosts provided".into()));
    }

    let mut cluster = ClusterConfig::new(hosts);
    cluster.authenticator = PasswordAuthenticator {
        username: config.username.clone(),
        password: config.password.clone(),
    };
    cluster.protocol_version = config.effective_protocol_version();
    cluster.connect_timeout = config.connect_timeout();
    Ok(cluster)
}

/// TLS options for `config`.
///
/// Without a certificate or issuing CA the driver default trust behaviour is
/// used and `insecure_tls` / `tls_min_version` do not apply. Otherwise the
/// bundle is resolved, `insecure_tls` is layered on, and the minimum version is
/// either the named one or reset to unset, discarding the resolver's TLS 1.2
/// default.
pub fn ssl_options(config: &CassandraConfig) -> Result<SslOptions> {
    let material = TlsMaterial::from_config(config)?;

    if material.is_none() {
        if config.insecure_tls || !config.tls_min_version.is_empty() {
            tracing::warn!(
                "insecure_tls and tls_min_version are ignored without certificate or issuing_ca"
            );
        }
        return Ok(SslOptions {
            settings: None,
            client_config: TlsSettings::default().client_config()?,
        });
    }

    let mut settings = resolve_bundle(&material)?;
    settings.insecure_skip_verify = config.insecure_tls;
    settings.min_version = if config.tls_min_version.is_empty() {
        0
    } else {
        lookup_tls_version(&config.tls_min_version)?
    };

    let client_config = settings.client_config()?;
    Ok(SslOptions {
        settings: Some(settings),
        client_config,
    })
}

/// Close a session, logging instead of returning the failure
pub(crate) async fn close_quietly<S: ClusterSession>(session: &S, reason: &str) {
    if let Err(e) = session.close().await {
        tracing::warn!(reason, error = %e, "failed to close session");
    }
}

fn driver_message(err: Error) -> String {
    match err {
        Error::Driver(msg) => msg,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tls::{VERSION_TLS12, VERSION_TLS13};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const CLIENT_CERT: &str = include_str!("../../tests/fixtures/client.pem");
    const CLIENT_KEY: &str = include_str!("../../tests/fixtures/client.key");
    const CA_CERT: &str = include_str!("../../tests/fixtures/ca.pem");

    #[derive(Default)]
    struct Probe {
        connects: AtomicUsize,
        closes: AtomicUsize,
        statements: Mutex<Vec<String>>,
        fail_connect: bool,
        fail_validation: bool,
    }

    struct MockDriver {
        probe: Arc<Probe>,
    }

    struct MockSession {
        probe: Arc<Probe>,
        consistency: Option<Consistency>,
    }

    impl ClusterSession for MockSession {
        fn set_consistency(&mut self, consistency: Consistency) {
            self.consistency = Some(consistency);
        }

        fn consistency(&self) -> Option<Consistency> {
            self.consistency
        }

        async fn execute(&self, statement: &str) -> Result<()> {
            self.probe
                .statements
                .lock()
                .unwrap()
                .push(statement.to_string());
            if self.probe.fail_validation {
                return Err(Error::Driver("Unauthorized: not a superuser".into()));
            }
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.probe.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl ClusterDriver for MockDriver {
        type Session = MockSession;

        async fn create_session(&self, _cluster: &ClusterConfig) -> Result<MockSession> {
            self.probe.connects.fetch_add(1, Ordering::SeqCst);
            if self.probe.fail_connect {
                return Err(Error::Driver("connection refused".into()));
            }
            Ok(MockSession {
                probe: self.probe.clone(),
                consistency: None,
            })
        }
    }

    fn factory(probe: Probe) -> (SessionFactory<MockDriver>, Arc<Probe>) {
        let probe = Arc::new(probe);
        let factory = SessionFactory::new(MockDriver {
            probe: probe.clone(),
        });
        (factory, probe)
    }

    fn base_config() -> CassandraConfig {
        CassandraConfig {
            hosts: "127.0.0.1".into(),
            username: "cassandra".into(),
            password: "cassandra".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_cluster_config_from_record() {
        let mut config = base_config();
        config.hosts = "10.0.0.1,10.0.0.2:9142".into();
        config.connect_timeout = 3;

        let cluster = cluster_config(&config).unwrap();
        assert_eq!(cluster.hosts, vec!["10.0.0.1:9042", "10.0.0.2:9142"]);
        assert_eq!(cluster.authenticator.username, "cassandra");
        assert_eq!(cluster.protocol_version, 2);
        assert_eq!(
            cluster.connect_timeout,
            Some(std::time::Duration::from_secs(3))
        );
        assert!(!cluster.tls_enabled());
    }

    #[test]
    fn test_cluster_config_requires_hosts() {
        let mut config = base_config();
        config.hosts = " , ".into();
        let err = cluster_config(&config).unwrap_err();
        assert_eq!(err.to_string(), "error creating session: no hosts provided");
    }

    #[test]
    fn test_ssl_options_without_material() {
        let mut config = base_config();
        config.tls = true;
        config.insecure_tls = true;

        let ssl = ssl_options(&config).unwrap();
        assert!(ssl.settings.is_none());
    }

    #[test]
    fn test_ssl_options_min_version_reset() {
        let mut config = base_config();
        config.tls = true;
        config.certificate = CLIENT_CERT.into();
        config.private_key = CLIENT_KEY.into();
        config.issuing_ca = CA_CERT.into();

        // The resolver defaults to TLS 1.2 on its own
        let material = TlsMaterial::from_config(&config).unwrap();
        assert_eq!(resolve_bundle(&material).unwrap().min_version, VERSION_TLS12);

        let ssl = ssl_options(&config).unwrap();
        let settings = ssl.settings.unwrap();
        assert_eq!(settings.min_version, 0);
        assert!(!settings.insecure_skip_verify);
    }

    #[test]
    fn test_ssl_options_applies_overrides() {
        let mut config = base_config();
        config.tls = true;
        config.insecure_tls = true;
        config.issuing_ca = CA_CERT.into();
        config.tls_min_version = "tls13".into();

        let settings = ssl_options(&config).unwrap().settings.unwrap();
        assert_eq!(settings.min_version, VERSION_TLS13);
        assert!(settings.insecure_skip_verify);
        assert!(!settings.has_client_identity());
    }

    #[test]
    fn test_ssl_options_invalid_min_version() {
        let mut config = base_config();
        config.tls = true;
        config.issuing_ca = CA_CERT.into();
        config.tls_min_version = "ssl3".into();

        let err = ssl_options(&config).unwrap_err();
        assert_eq!(err.to_string(), "invalid 'tls_min_version' in config");
    }

    #[tokio::test]
    async fn test_create_session_validates() {
        let (factory, probe) = factory(Probe::default());

        let session = factory.create_session(&base_config()).await.unwrap();

        assert_eq!(probe.connects.load(Ordering::SeqCst), 1);
        assert_eq!(*probe.statements.lock().unwrap(), vec!["LIST USERS"]);
        assert!(session.consistency().is_none());
    }

    #[tokio::test]
    async fn test_create_session_applies_consistency() {
        let (factory, _probe) = factory(Probe::default());
        let mut config = base_config();
        config.consistency = "LOCAL_QUORUM".into();

        let session = factory.create_session(&config).await.unwrap();
        assert_eq!(session.consistency(), Some(Consistency::LocalQuorum));
    }

    #[tokio::test]
    async fn test_create_session_invalid_consistency_closes_session() {
        let (factory, probe) = factory(Probe::default());
        let mut config = base_config();
        config.consistency = "MOSTLY".into();

        let err = factory.create_session(&config).await.err().unwrap();

        assert!(matches!(err, Error::InvalidConsistency(_)));
        assert_eq!(probe.connects.load(Ordering::SeqCst), 1);
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
        assert!(probe.statements.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_session_missing_key_before_network() {
        let (factory, probe) = factory(Probe::default());
        let mut config = base_config();
        config.tls = true;
        config.certificate = CLIENT_CERT.into();

        let err = factory.create_session(&config).await.err().unwrap();

        assert_eq!(
            err.to_string(),
            "found certificate for TLS authentication but no private key"
        );
        assert_eq!(probe.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_session_bad_bundle_before_network() {
        let (factory, probe) = factory(Probe::default());
        let mut config = base_config();
        config.tls = true;
        config.certificate = "garbage".into();
        config.private_key = "garbage".into();

        let err = factory.create_session(&config).await.err().unwrap();

        assert!(matches!(err, Error::CertificateBundle(_)));
        assert_eq!(probe.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_session_tls_ignored_when_disabled() {
        let (factory, probe) = factory(Probe::default());
        let mut config = base_config();
        config.certificate = CLIENT_CERT.into();

        // Certificate without key is irrelevant while tls is off
        assert!(factory.create_session(&config).await.is_ok());
        assert_eq!(probe.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_session_driver_failure() {
        let (factory, _probe) = factory(Probe {
            fail_connect: true,
            ..Default::default()
        });

        let err = factory.create_session(&base_config()).await.err().unwrap();
        assert_eq!(
            err.to_string(),
            "error creating session: connection refused"
        );
    }

    #[tokio::test]
    async fn test_create_session_validation_failure_closes_session() {
        let (factory, probe) = factory(Probe {
            fail_validation: true,
            ..Default::default()
        });

        let err = factory.create_session(&base_config()).await.err().unwrap();

        assert_eq!(
            err.to_string(),
            "error validating connection info: Unauthorized: not a superuser"
        );
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    }
}
