//! cassandra-producer: lazily connected, TLS-aware Cassandra sessions
//!
//! A connection producer turns an untyped configuration mapping into a single,
//! reusable cluster session. The session is built on first use under a lock,
//! optionally secured with mutual TLS, given a default consistency level, and
//! validated with `LIST USERS` before it is handed out.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> cassandra_producer::Result<()> {
//! use cassandra_producer::{CassandraProducer, ConnectionProducer};
//! use serde_json::json;
//!
//! let producer = CassandraProducer::new();
//! let config = json!({
//!     "hosts": "127.0.0.1",
//!     "username": "cassandra",
//!     "password": "cassandra",
//!     "tls": true,
//!     "issuing_ca": "-----BEGIN CERTIFICATE-----\n...",
//!     "tls_min_version": "tls12",
//! });
//!
//! producer.initialize(config.as_object().unwrap(), false).await?;
//! let session = producer.connection().await?;
//! # let _ = session;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod producer;

pub use config::CassandraConfig;
pub use connection::{ClusterDriver, ClusterSession, Consistency, ScyllaDriver, ScyllaSession};
pub use error::{Error, Result};
pub use producer::{CassandraProducer, ConnectionProducer};
