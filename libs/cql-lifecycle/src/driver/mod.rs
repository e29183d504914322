//! Driver seam
//!
//! The manager never talks to the cluster directly. It asks a [`Driver`] for a
//! [`Connection`] and later shuts that connection's parts down. `ScyllaDriver`
//! (feature `scylla`) is the production implementation; tests plug in recording or
//! mocked drivers.

#[cfg(feature = "scylla")]
mod scylladb;

#[cfg(feature = "scylla")]
pub use scylladb::{ScyllaCluster, ScyllaDriver, ScyllaSession};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::config::{CqlConfig, SetupOptions};
use crate::consistency::Consistency;

/// Error type for driver operations
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[cfg(feature = "scylla")]
    #[error("Cassandra error: {0}")]
    NewSession(#[from] scylla::errors::NewSessionError),

    #[cfg(feature = "scylla")]
    #[error("Execution error: {0}")]
    Execution(#[from] scylla::errors::ExecutionError),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Keyspace error: {0}")]
    Keyspace(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Session is shut down")]
    SessionClosed,
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Everything a driver needs to open a connection
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectSettings {
    pub hosts: Vec<String>,
    pub keyspace: String,
    pub consistency: Consistency,
    pub options: SetupOptions,
}

impl From<&CqlConfig> for ConnectSettings {
    fn from(config: &CqlConfig) -> Self {
        Self {
            hosts: config.hosts.clone(),
            keyspace: config.keyspace.clone(),
            consistency: config.consistency,
            options: config.setup_options.clone(),
        }
    }
}

/// Cluster-level client (node pool, topology)
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn shutdown(&self) -> DriverResult<()>;
}

/// Execution context bound to a keyspace
#[async_trait]
pub trait DriverSession: Send + Sync {
    /// Execute a statement, discarding any rows
    async fn execute(&self, cql: &str) -> DriverResult<()>;

    /// Column names of an existing table, empty if the table does not exist
    async fn table_columns(&self, keyspace: &str, table: &str) -> DriverResult<Vec<String>>;

    /// `release_version` from `system.local`
    async fn release_version(&self) -> DriverResult<Option<String>>;

    async fn shutdown(&self) -> DriverResult<()>;
}

/// A live connection: cluster client plus session
///
/// Either part may be absent; teardown checks each independently.
#[derive(Clone, Default)]
pub struct Connection {
    pub cluster: Option<Arc<dyn ClusterClient>>,
    pub session: Option<Arc<dyn DriverSession>>,
}

impl Connection {
    pub fn new(cluster: Arc<dyn ClusterClient>, session: Arc<dyn DriverSession>) -> Self {
        Self {
            cluster: Some(cluster),
            session: Some(session),
        }
    }

    /// Shut down the cluster client, then the session.
    ///
    /// Both are attempted even if the first fails; the first error is returned.
    pub async fn shutdown(self) -> DriverResult<()> {
        let cluster_result = match self.cluster {
            Some(cluster) => cluster.shutdown().await,
            None => Ok(()),
        };
        let session_result = match self.session {
            Some(session) => session.shutdown().await,
            None => Ok(()),
        };
        cluster_result.and(session_result)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("cluster", &self.cluster.is_some())
            .field("session", &self.session.is_some())
            .finish()
    }
}

/// Opens connections to a cluster
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Driver: Send + Sync {
    async fn connect(&self, settings: &ConnectSettings) -> DriverResult<Connection>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingPart {
        shutdowns: AtomicU32,
        fail: bool,
    }

    impl CountingPart {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                shutdowns: AtomicU32::new(0),
                fail,
            })
        }

        fn stop(&self) -> DriverResult<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(DriverError::ConnectionFailed("already gone".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ClusterClient for CountingPart {
        async fn shutdown(&self) -> DriverResult<()> {
            self.stop()
        }
    }

    #[async_trait]
    impl DriverSession for CountingPart {
        async fn execute(&self, _cql: &str) -> DriverResult<()> {
            Ok(())
        }

        async fn table_columns(&self, _keyspace: &str, _table: &str) -> DriverResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn release_version(&self) -> DriverResult<Option<String>> {
            Ok(None)
        }

        async fn shutdown(&self) -> DriverResult<()> {
            self.stop()
        }
    }

    #[tokio::test]
    async fn test_shutdown_stops_both_parts_even_on_error() {
        let cluster = CountingPart::new(true);
        let session = CountingPart::new(false);
        let connection = Connection::new(cluster.clone(), session.clone());

        let result = connection.shutdown().await;

        assert!(result.is_err());
        assert_eq!(cluster.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(session.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_with_missing_parts() {
        let session = CountingPart::new(false);
        let connection = Connection {
            cluster: None,
            session: Some(session.clone()),
        };
        assert!(connection.shutdown().await.is_ok());
        assert_eq!(session.shutdowns.load(Ordering::SeqCst), 1);

        assert!(Connection::default().shutdown().await.is_ok());
    }

    #[test]
    fn test_settings_from_config() {
        let config = CqlConfig::new(vec!["10.0.0.1"], "ks1").with_consistency(Consistency::All);
        let settings = ConnectSettings::from(&config);
        assert_eq!(settings.hosts, vec!["10.0.0.1"]);
        assert_eq!(settings.keyspace, "ks1");
        assert_eq!(settings.consistency, Consistency::All);
    }
}
