//! Connection producers
//!
//! A producer owns at most one live session and hands it out to the hosting
//! backend on demand.

mod cassandra;

pub use cassandra::{CassandraProducer, CLOSE_IS_BEST_EFFORT};

use crate::Result;
use serde_json::{Map, Value};
use std::future::Future;

/// Lifecycle every database connection producer exposes to the backend
pub trait ConnectionProducer: Send + Sync {
    /// Handle returned by [`ConnectionProducer::connection`]
    type Connection: Send + Sync;

    /// Decode `config` into the producer and optionally connect right away
    fn initialize(
        &self,
        config: &Map<String, Value>,
        verify_connection: bool,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Return the cached connection, creating it on first use
    fn connection(&self) -> impl Future<Output = Result<Self::Connection>> + Send;

    /// Release the cached connection
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}
