//! Cassandra connection producer

use super::ConnectionProducer;
use crate::config::CassandraConfig;
use crate::connection::{close_quietly, ClusterDriver, ClusterSession, ScyllaDriver, SessionFactory};
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

/// `close()` never reports a failure from the underlying session. The failure
/// is logged and the cached handle is cleared either way.
pub const CLOSE_IS_BEST_EFFORT: bool = true;

struct ProducerState<S> {
    config: CassandraConfig,
    initialized: bool,
    session: Option<Arc<S>>,
}

/// Lazily connected, cached Cassandra session.
///
/// All state sits behind one async mutex that is held across session
/// construction, so concurrent callers share a single session.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> cassandra_producer::Result<()> {
/// use cassandra_producer::CassandraProducer;
/// use serde_json::json;
///
/// let producer = CassandraProducer::new();
/// let config = json!({
///     "hosts": "cassandra-1.internal,cassandra-2.internal",
///     "username": "vault",
///     "password": "secret",
///     "consistency": "LOCAL_QUORUM",
/// });
/// producer
///     .initialize(config.as_object().unwrap(), true)
///     .await?;
///
/// let session = producer.connection().await?;
/// # let _ = session;
/// producer.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct CassandraProducer<D: ClusterDriver = ScyllaDriver> {
    factory: SessionFactory<D>,
    state: Mutex<ProducerState<D::Session>>,
}

impl CassandraProducer<ScyllaDriver> {
    /// Producer backed by the scylla driver
    pub fn new() -> Self {
        Self::with_driver(ScyllaDriver)
    }
}

impl Default for CassandraProducer<ScyllaDriver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: ClusterDriver> CassandraProducer<D> {
    /// Type name reported to the hosting backend
    pub const PRODUCER_TYPE: &'static str = "cassandra";

    /// Producer over a custom driver
    pub fn with_driver(driver: D) -> Self {
        Self {
            factory: SessionFactory::new(driver),
            state: Mutex::new(ProducerState {
                config: CassandraConfig::default(),
                initialized: false,
                session: None,
            }),
        }
    }

    /// Type name reported to the hosting backend
    pub fn producer_type(&self) -> &'static str {
        Self::PRODUCER_TYPE
    }

    /// Merge `config` into the producer.
    ///
    /// The producer counts as initialized once decoding succeeds, even if the
    /// optional verification then fails. A session cached from a previous
    /// configuration is released.
    ///
    /// # Errors
    ///
    /// * [`Error::Config`] if the mapping cannot be decoded
    /// * [`Error::Initialize`] wrapping the cause if `verify_connection` is set
    ///   and no session could be built
    pub async fn initialize(&self, config: &Map<String, Value>, verify_connection: bool) -> Result<()> {
        let mut state = self.state.lock().await;

        state.config.merge(config)?;
        state.initialized = true;
        tracing::debug!(config = ?state.config, "producer initialized");

        if let Some(stale) = state.session.take() {
            crate::metrics::counters::session_closed();
            close_quietly(&*stale, "reinitialized").await;
        }

        if verify_connection {
            self.connect_locked(&mut state)
                .await
                .map_err(|e| Error::Initialize(Box::new(e)))?;
        }

        Ok(())
    }

    /// Return the cached session, building it on first use.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] before a successful `initialize`, otherwise any
    /// error from session construction.
    pub async fn connection(&self) -> Result<Arc<D::Session>> {
        let mut state = self.state.lock().await;
        self.connect_locked(&mut state).await
    }

    /// Release the cached session. Always succeeds.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        if let Some(session) = state.session.take() {
            crate::metrics::counters::session_closed();
            if let Err(e) = session.close().await {
                tracing::warn!(error = %e, "failed to close session");
                if !CLOSE_IS_BEST_EFFORT {
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Whether `initialize` has decoded a configuration
    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.initialized
    }

    /// Whether a session is currently cached
    pub async fn has_session(&self) -> bool {
        self.state.lock().await.session.is_some()
    }

    /// Snapshot of the current configuration
    pub async fn config(&self) -> CassandraConfig {
        self.state.lock().await.config.clone()
    }

    async fn connect_locked(&self, state: &mut ProducerState<D::Session>) -> Result<Arc<D::Session>> {
        if !state.initialized {
            return Err(Error::NotInitialized);
        }

        if let Some(session) = &state.session {
            crate::metrics::counters::cache_hit();
            return Ok(Arc::clone(session));
        }

        let session = Arc::new(self.factory.create_session(&state.config).await?);
        state.session = Some(Arc::clone(&session));
        Ok(session)
    }
}

impl<D: ClusterDriver> ConnectionProducer for CassandraProducer<D> {
    type Connection = Arc<D::Session>;

    async fn initialize(&self, config: &Map<String, Value>, verify_connection: bool) -> Result<()> {
        CassandraProducer::initialize(self, config, verify_connection).await
    }

    async fn connection(&self) -> Result<Self::Connection> {
        CassandraProducer::connection(self).await
    }

    async fn close(&self) -> Result<()> {
        CassandraProducer::close(self).await
    }
}

impl<D: ClusterDriver> std::fmt::Debug for CassandraProducer<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CassandraProducer")
            .field("type", &Self::PRODUCER_TYPE)
            .finish_non_exhaustive()
    }
}
