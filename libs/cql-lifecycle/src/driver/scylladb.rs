use async_trait::async_trait;
use scylla::client::execution_profile::ExecutionProfile;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::response::query_result::QueryResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::SetupOptions;

use super::{
    ClusterClient, ConnectSettings, Connection, Driver, DriverError, DriverResult, DriverSession,
};

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const VERSION_QUERY: &str = "SELECT release_version FROM system.local";
const COLUMNS_QUERY: &str =
    "SELECT column_name FROM system_schema.columns WHERE keyspace_name = ? AND table_name = ?";

/// [`Driver`] backed by the `scylla` crate
///
/// Works against both Apache Cassandra and ScyllaDB.
#[derive(Clone, Debug, Default)]
pub struct ScyllaDriver;

impl ScyllaDriver {
    pub fn new() -> Self {
        Self
    }

    fn builder(settings: &ConnectSettings) -> SessionBuilder {
        let options = &settings.options;

        for key in options.extra.keys() {
            warn!(option = %key, "Ignoring unsupported Cassandra setup option");
        }

        let mut profile = ExecutionProfile::builder().consistency(settings.consistency.into());
        if let Some(secs) = options.request_timeout_secs {
            profile = profile.request_timeout(Some(Duration::from_secs(secs)));
        }

        let hosts: Vec<String> = match options.port {
            Some(port) => settings
                .hosts
                .iter()
                .map(|host| with_default_port(host, port))
                .collect(),
            None => settings.hosts.clone(),
        };

        let mut builder = SessionBuilder::new()
            .known_nodes(&hosts)
            .connection_timeout(Duration::from_secs(
                options
                    .connect_timeout_secs
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ))
            .default_execution_profile_handle(profile.build().into_handle());

        if let Some((username, password)) = credentials(options) {
            builder = builder.user(username, password);
        }

        if let Some(nodelay) = options.tcp_nodelay {
            builder = builder.tcp_nodelay(nodelay);
        }

        builder
    }
}

#[async_trait]
impl Driver for ScyllaDriver {
    async fn connect(&self, settings: &ConnectSettings) -> DriverResult<Connection> {
        info!(
            hosts = ?settings.hosts,
            consistency = %settings.consistency,
            "Attempting to connect to Cassandra"
        );

        let session: Session = Self::builder(settings).build().await?;

        // Verify connection by querying system table
        session
            .query_unpaged(VERSION_QUERY, &[])
            .await
            .map_err(|e| DriverError::ConnectionFailed(e.to_string()))?;

        info!("Successfully connected to Cassandra");

        let session = Arc::new(session);
        Ok(Connection::new(
            Arc::new(ScyllaCluster::new(session.clone(), settings.hosts.clone())),
            Arc::new(ScyllaSession::new(session)),
        ))
    }
}

/// Cluster half of a scylla connection
///
/// The scylla driver folds the cluster and the session into one object; both halves
/// hold a reference to it and the driver closes its node connections once both have
/// been shut down.
pub struct ScyllaCluster {
    inner: RwLock<Option<Arc<Session>>>,
    hosts: Vec<String>,
}

impl ScyllaCluster {
    fn new(session: Arc<Session>, hosts: Vec<String>) -> Self {
        Self {
            inner: RwLock::new(Some(session)),
            hosts,
        }
    }

}

#[async_trait]
impl ClusterClient for ScyllaCluster {
    async fn shutdown(&self) -> DriverResult<()> {
        if self.inner.write().await.take().is_some() {
            debug!(hosts = ?self.hosts, "Cassandra cluster client released");
        }
        Ok(())
    }
}

/// Session half of a scylla connection
pub struct ScyllaSession {
    inner: RwLock<Option<Arc<Session>>>,
}

impl ScyllaSession {
    fn new(session: Arc<Session>) -> Self {
        Self {
            inner: RwLock::new(Some(session)),
        }
    }

    /// The underlying driver session, for queries beyond lifecycle management
    pub async fn session(&self) -> DriverResult<Arc<Session>> {
        self.inner.read().await.clone().ok_or(DriverError::SessionClosed)
    }
}

#[async_trait]
impl DriverSession for ScyllaSession {
    async fn execute(&self, cql: &str) -> DriverResult<()> {
        debug!(cql = %cql, "Executing statement");
        self.session().await?.query_unpaged(cql, &[]).await?;
        Ok(())
    }

    async fn table_columns(&self, keyspace: &str, table: &str) -> DriverResult<Vec<String>> {
        let result = self
            .session()
            .await?
            .query_unpaged(COLUMNS_QUERY, (keyspace, table))
            .await?;

        let rows_result = result
            .into_rows_result()
            .map_err(|e| DriverError::Query(e.to_string()))?;

        rows_result
            .rows::<(String,)>()
            .map_err(|e| DriverError::Query(e.to_string()))?
            .map(|row| {
                row.map(|(name,)| name)
                    .map_err(|e| DriverError::Query(e.to_string()))
            })
            .collect()
    }

    async fn release_version(&self) -> DriverResult<Option<String>> {
        let result = self.session().await?.query_unpaged(VERSION_QUERY, &[]).await?;
        Ok(extract_version(result))
    }

    async fn shutdown(&self) -> DriverResult<()> {
        if self.inner.write().await.take().is_some() {
            info!("Cassandra session closed");
        }
        Ok(())
    }
}

/// Username and password, only when both are set
fn credentials(options: &SetupOptions) -> Option<(&str, &str)> {
    match (&options.username, &options.password) {
        (Some(username), Some(password)) => Some((username.as_str(), password.as_str())),
        (None, None) => None,
        (Some(_), None) => {
            warn!("Ignoring Cassandra username: no password supplied");
            None
        }
        (None, Some(_)) => {
            warn!("Ignoring Cassandra password: no username supplied");
            None
        }
    }
}

/// Append `port` unless the host already names one
fn with_default_port(host: &str, port: u16) -> String {
    let has_port = match host.strip_prefix('[') {
        Some(bracketed) => bracketed.contains("]:"),
        None => host.matches(':').count() == 1,
    };

    if has_port {
        host.to_string()
    } else if host.contains(':') {
        // Bare IPv6 address
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

fn extract_version(result: QueryResult) -> Option<String> {
    let rows_result = result.into_rows_result().ok()?;
    let mut rows = rows_result.rows::<(String,)>().ok()?;
    let row: Result<(String,), _> = rows.next()?;
    row.ok().map(|(v,)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consistency::Consistency;

    #[test]
    fn test_port_applies_to_hosts_without_one() {
        assert_eq!(with_default_port("10.0.0.1", 9142), "10.0.0.1:9142");
        assert_eq!(with_default_port("10.0.0.1:9042", 9142), "10.0.0.1:9042");
        assert_eq!(with_default_port("db.internal", 19042), "db.internal:19042");
        assert_eq!(with_default_port("::1", 9142), "[::1]:9142");
        assert_eq!(with_default_port("[::1]", 9142), "[::1]:9142");
        assert_eq!(with_default_port("[::1]:9042", 9142), "[::1]:9042");
    }

    #[test]
    fn test_partial_credentials_are_ignored() {
        let both = SetupOptions {
            username: Some("cassandra".to_string()),
            password: Some("secret".to_string()),
            ..SetupOptions::default()
        };
        assert_eq!(credentials(&both), Some(("cassandra", "secret")));

        let user_only = SetupOptions {
            username: Some("cassandra".to_string()),
            ..SetupOptions::default()
        };
        assert_eq!(credentials(&user_only), None);

        let password_only = SetupOptions {
            password: Some("secret".to_string()),
            ..SetupOptions::default()
        };
        assert_eq!(credentials(&password_only), None);
        assert_eq!(credentials(&SetupOptions::default()), None);
    }

    fn settings() -> ConnectSettings {
        let hosts = std::env::var("CASSANDRA_HOSTS").unwrap_or_else(|_| "127.0.0.1:9042".to_string());
        ConnectSettings {
            hosts: hosts.split(',').map(str::to_string).collect(),
            keyspace: "system".to_string(),
            consistency: Consistency::One,
            options: SetupOptions::default(),
        }
    }

    #[tokio::test]
    #[ignore] // Requires actual Cassandra
    async fn test_connect_and_shutdown() {
        let connection = ScyllaDriver::new().connect(&settings()).await.unwrap();
        let session = connection.session.clone().unwrap();

        assert!(session.release_version().await.unwrap().is_some());

        connection.shutdown().await.unwrap();
        assert!(matches!(
            session.execute(VERSION_QUERY).await,
            Err(DriverError::SessionClosed)
        ));
    }

    #[tokio::test]
    #[ignore] // Requires actual Cassandra
    async fn test_table_columns() {
        let connection = ScyllaDriver::new().connect(&settings()).await.unwrap();
        let session = connection.session.clone().unwrap();

        let columns = session.table_columns("system", "local").await.unwrap();
        assert!(columns.iter().any(|c| c == "release_version"));

        let missing = session.table_columns("system", "no_such_table").await.unwrap();
        assert!(missing.is_empty());
    }
}
