//! Driver abstraction and the scylla-backed implementation
//!
//! The session factory only talks to [`ClusterDriver`] and [`ClusterSession`],
//! which keeps orchestration independent from the wire driver.

use super::cluster::ClusterConfig;
use super::consistency::Consistency;
use crate::{Error, Result};
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use std::future::Future;

/// Native protocol version the scylla driver speaks
pub const SCYLLA_PROTOCOL_VERSION: u8 = 4;

/// A live session against a cluster
pub trait ClusterSession: Send + Sync + 'static {
    /// Set the default consistency for statements run through this session
    fn set_consistency(&mut self, consistency: Consistency);

    /// Consistency applied by [`ClusterSession::set_consistency`], if any
    fn consistency(&self) -> Option<Consistency>;

    /// Run a statement and discard its rows
    fn execute(&self, statement: &str) -> impl Future<Output = Result<()>> + Send;

    /// Release the session
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Opens sessions from a [`ClusterConfig`]
pub trait ClusterDriver: Send + Sync + 'static {
    /// Session type produced by this driver
    type Session: ClusterSession;

    /// Connect to the cluster.
    ///
    /// Failures are reported as [`Error::Driver`].
    fn create_session(
        &self,
        cluster: &ClusterConfig,
    ) -> impl Future<Output = Result<Self::Session>> + Send;
}

/// Driver backed by the `scylla` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ScyllaDriver;

impl ClusterDriver for ScyllaDriver {
    type Session = ScyllaSession;

    async fn create_session(&self, cluster: &ClusterConfig) -> Result<ScyllaSession> {
        if cluster.protocol_version != SCYLLA_PROTOCOL_VERSION {
            tracing::debug!(
                requested = cluster.protocol_version,
                negotiated = SCYLLA_PROTOCOL_VERSION,
                "protocol version is negotiated by the driver"
            );
        }

        let mut builder = SessionBuilder::new().known_nodes(&cluster.hosts).user(
            cluster.authenticator.username.clone(),
            cluster.authenticator.password.clone(),
        );

        if let Some(timeout) = cluster.connect_timeout {
            builder = builder.connection_timeout(timeout);
        }

        if let Some(ssl) = &cluster.ssl_opts {
            builder = builder.tls_context(Some(ssl.client_config.clone()));
        }

        let session = builder
            .build()
            .await
            .map_err(|e| Error::Driver(e.to_string()))?;

        Ok(ScyllaSession {
            inner: session,
            consistency: None,
        })
    }
}

/// Session opened by [`ScyllaDriver`]
pub struct ScyllaSession {
    inner: Session,
    consistency: Option<Consistency>,
}

impl ScyllaSession {
    /// Underlying driver session, for running application queries
    pub fn inner(&self) -> &Session {
        &self.inner
    }
}

impl std::fmt::Debug for ScyllaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScyllaSession")
            .field("consistency", &self.consistency)
            .finish_non_exhaustive()
    }
}

impl ClusterSession for ScyllaSession {
    fn set_consistency(&mut self, consistency: Consistency) {
        // Handles share the profile they point at, so remapping a clone of the
        // default handle changes the session default.
        let mut handle = self.inner.get_default_execution_profile_handle().clone();
        let profile = handle
            .pointee_to_builder()
            .consistency(to_driver_consistency(consistency))
            .build();
        handle.map_to_another_profile(profile);
        self.consistency = Some(consistency);
    }

    fn consistency(&self) -> Option<Consistency> {
        self.consistency
    }

    async fn execute(&self, statement: &str) -> Result<()> {
        self.inner
            .query_unpaged(statement, ())
            .await
            .map_err(|e| Error::Driver(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // The driver tears down its connection pool when the last handle drops.
        tracing::debug!("releasing scylla session");
        Ok(())
    }
}

fn to_driver_consistency(consistency: Consistency) -> scylla::statement::Consistency {
    use scylla::statement::Consistency as Driver;

    match consistency {
        Consistency::Any => Driver::Any,
        Consistency::One => Driver::One,
        Consistency::Two => Driver::Two,
        Consistency::Three => Driver::Three,
        Consistency::Quorum => Driver::Quorum,
        Consistency::All => Driver::All,
        Consistency::LocalQuorum => Driver::LocalQuorum,
        Consistency::EachQuorum => Driver::EachQuorum,
        Consistency::Serial => Driver::Serial,
        Consistency::LocalSerial => Driver::LocalSerial,
        Consistency::LocalOne => Driver::LocalOne,
    }
}
