use core_config::ConfigSource;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::config::{CqlConfig, KEYSPACE_KEY};
use crate::driver::{ConnectSettings, Connection, Driver, DriverError, DriverSession};
use crate::error::{CqlError, CqlResult};
use crate::health::{HealthStatus, check_health_detailed};
use crate::lifecycle::LifecycleAdapter;
use crate::model::{Model, ModelDef, ModelRegistry};
use crate::schema::{self, SyncOutcome, TableSchema, UserTypeSchema};

/// Observable state of the managed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    /// Settings recorded, cluster not contacted yet (lazy or deferred retry)
    Pending,
    Connected,
}

enum ConnectionState {
    Disconnected,
    Pending(ConnectSettings),
    Connected(Connection),
}

impl ConnectionState {
    fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionState::Pending(_) => ConnectionStatus::Pending,
            ConnectionState::Connected(_) => ConnectionStatus::Connected,
        }
    }
}

/// Owns the application's cluster connection and drives its lifecycle
///
/// The manager is created once by the application root and shared as
/// `Arc<CqlManager>`. It holds at most one connection; every `setup_connection`
/// tears the previous one down first.
///
/// # Example
///
/// ```ignore
/// use cql_lifecycle::{CqlManager, ScyllaDriver, TaskWorkerAdapter, TaskWorkerSignals};
/// use core_config::EnvSource;
///
/// let signals = Arc::new(TaskWorkerSignals::new());
/// let manager = CqlManager::builder(Arc::new(ScyllaDriver::new()))
///     .adapter(TaskWorkerAdapter::new(signals.clone()))
///     .model::<Task>()
///     .app(Arc::new(EnvSource::new()))
///     .build()
///     .await?;
///
/// manager.sync_db().await?;
/// ```
pub struct CqlManager {
    driver: Arc<dyn Driver>,
    adapters: Vec<Box<dyn LifecycleAdapter>>,
    adapters_registered: AtomicBool,
    registry: RwLock<ModelRegistry>,
    app: RwLock<Option<Arc<dyn ConfigSource>>>,
    config: RwLock<Option<CqlConfig>>,
    keyspace: RwLock<Option<String>>,
    state: Mutex<ConnectionState>,
}

impl CqlManager {
    pub fn builder(driver: Arc<dyn Driver>) -> CqlManagerBuilder {
        CqlManagerBuilder {
            driver,
            app: None,
            adapters: Vec::new(),
            models: Vec::new(),
        }
    }

    /// Bind the manager to a host application.
    ///
    /// Reads and validates configuration, registers the attached lifecycle adapters
    /// (once per manager), then connects. Invalid configuration fails before any
    /// connection is attempted.
    #[instrument(skip_all)]
    pub async fn init_app(self: &Arc<Self>, app: Arc<dyn ConfigSource>) -> CqlResult<()> {
        let config = CqlConfig::from_source(app.as_ref())?;

        info!(
            hosts = ?config.hosts,
            keyspace = %config.keyspace,
            consistency = %config.consistency,
            lazy_connect = config.lazy_connect,
            retry_connect = config.retry_connect,
            "Binding Cassandra connection manager"
        );

        *self.keyspace.write().await = Some(config.keyspace.clone());
        *self.config.write().await = Some(config);
        *self.app.write().await = Some(app);

        if !self.adapters_registered.swap(true, Ordering::SeqCst) {
            for adapter in &self.adapters {
                adapter.register(self);
                debug!(adapter = adapter.name(), "Lifecycle adapter registered");
            }
        }

        self.setup_connection().await
    }

    /// Tear down any existing connection and open a new one.
    ///
    /// With `lazy_connect` the cluster is contacted on first use instead. With
    /// `retry_connect` a failed attempt is deferred to first use instead of failing.
    #[instrument(skip(self))]
    pub async fn setup_connection(&self) -> CqlResult<()> {
        let config = self.config.read().await.clone().ok_or(CqlError::NotBound)?;
        let mut settings = ConnectSettings::from(&config);
        if let Some(keyspace) = self.keyspace.read().await.clone() {
            settings.keyspace = keyspace;
        }

        let mut state = self.state.lock().await;
        Self::teardown(&mut state).await?;

        if config.lazy_connect {
            debug!("Lazy connect enabled, deferring Cassandra connection");
            *state = ConnectionState::Pending(settings);
            return Ok(());
        }

        match self.driver.connect(&settings).await {
            Ok(connection) => {
                info!(keyspace = %settings.keyspace, "Cassandra connection established");
                *state = ConnectionState::Connected(connection);
                Ok(())
            }
            Err(e) if config.retry_connect => {
                warn!(error = %e, "Cassandra connection failed, retrying on first use");
                *state = ConnectionState::Pending(settings);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Shut down the cluster client and the session, if any. Safe to repeat.
    #[instrument(skip(self))]
    pub async fn shutdown_connection(&self) -> CqlResult<()> {
        let mut state = self.state.lock().await;
        Self::teardown(&mut state).await
    }

    async fn teardown(state: &mut ConnectionState) -> CqlResult<()> {
        match std::mem::replace(state, ConnectionState::Disconnected) {
            ConnectionState::Connected(connection) => {
                info!("Shutting down Cassandra connection");
                connection.shutdown().await?;
            }
            ConnectionState::Pending(_) => debug!("Discarding pending Cassandra connection"),
            ConnectionState::Disconnected => {}
        }
        Ok(())
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.state.lock().await.status()
    }

    /// Active session, opening a pending connection first if needed
    pub async fn session(&self) -> CqlResult<Arc<dyn DriverSession>> {
        let mut state = self.state.lock().await;

        if let ConnectionState::Pending(settings) = &*state {
            info!("Opening deferred Cassandra connection");
            let connection = self.driver.connect(settings).await?;
            *state = ConnectionState::Connected(connection);
        }

        match &*state {
            ConnectionState::Connected(connection) => connection
                .session
                .clone()
                .ok_or(CqlError::Driver(DriverError::SessionClosed)),
            _ => Err(CqlError::NotConnected),
        }
    }

    /// Synchronize the table of every concrete registered model.
    ///
    /// Returns one outcome per model, in discovery order.
    #[instrument(skip(self))]
    pub async fn sync_db(&self) -> CqlResult<Vec<SyncOutcome>> {
        let tables: Vec<TableSchema> = self
            .registry
            .read()
            .await
            .concrete_models()
            .into_iter()
            .filter_map(|model| model.table.clone())
            .collect();

        if tables.is_empty() {
            debug!("No concrete models registered, nothing to sync");
            return Ok(Vec::new());
        }

        let mut outcomes = Vec::with_capacity(tables.len());
        for table in &tables {
            outcomes.push(self.sync_table(table).await?);
        }

        info!(tables = outcomes.len(), "Database schema synchronized");
        Ok(outcomes)
    }

    pub async fn sync_table(&self, table: &TableSchema) -> CqlResult<SyncOutcome> {
        let keyspace = self.require_keyspace().await?;
        let session = self.session().await?;
        schema::sync_table(session.as_ref(), table, &keyspace).await
    }

    pub async fn sync_type(&self, user_type: &UserTypeSchema) -> CqlResult<()> {
        let keyspace = self.require_keyspace().await?;
        let session = self.session().await?;
        schema::sync_type(session.as_ref(), user_type, &keyspace).await
    }

    pub async fn create_keyspace_simple(
        &self,
        keyspace: &str,
        replication_factor: u32,
    ) -> CqlResult<()> {
        let session = self.session().await?;
        session
            .execute(&schema::create_keyspace_simple_cql(keyspace, replication_factor))
            .await?;
        info!(keyspace = %keyspace, replication_factor, "Keyspace ready");
        Ok(())
    }

    /// Change the default keyspace used by the mapping layer.
    ///
    /// `None` (or an empty name) restores `CASSANDRA_KEYSPACE` from the bound
    /// application. The change applies manager-wide to every later sync and to the
    /// next `setup_connection`; it is not scoped to a request.
    pub async fn set_keyspace(&self, keyspace: Option<&str>) -> CqlResult<()> {
        let keyspace = match keyspace.filter(|k| !k.is_empty()) {
            Some(name) => name.to_string(),
            None => {
                let app = self.app.read().await.clone().ok_or(CqlError::NotBound)?;
                app.get_string(KEYSPACE_KEY)?
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| CqlError::NoConfig(format!("{} must be supplied", KEYSPACE_KEY)))?
            }
        };

        info!(keyspace = %keyspace, "Default keyspace changed");
        *self.keyspace.write().await = Some(keyspace);
        Ok(())
    }

    pub async fn default_keyspace(&self) -> Option<String> {
        self.keyspace.read().await.clone()
    }

    async fn require_keyspace(&self) -> CqlResult<String> {
        self.default_keyspace().await.ok_or(CqlError::NotBound)
    }

    pub async fn register_model<M: Model>(&self) -> CqlResult<()> {
        self.registry.write().await.register::<M>()
    }

    pub async fn register_model_def(&self, def: ModelDef) -> CqlResult<()> {
        self.registry.write().await.register_def(def)
    }

    /// Probe the cluster; never fails, an unreachable cluster reports unhealthy
    pub async fn health(&self) -> HealthStatus {
        match self.session().await {
            Ok(session) => check_health_detailed(session.as_ref()).await,
            Err(e) => HealthStatus::unhealthy(e.to_string()),
        }
    }
}

/// Builder for [`CqlManager`]
pub struct CqlManagerBuilder {
    driver: Arc<dyn Driver>,
    app: Option<Arc<dyn ConfigSource>>,
    adapters: Vec<Box<dyn LifecycleAdapter>>,
    models: Vec<ModelDef>,
}

impl CqlManagerBuilder {
    /// Bind to this application as part of `build()`
    pub fn app(mut self, app: Arc<dyn ConfigSource>) -> Self {
        self.app = Some(app);
        self
    }

    pub fn adapter(mut self, adapter: impl LifecycleAdapter + 'static) -> Self {
        self.adapters.push(Box::new(adapter));
        self
    }

    pub fn model<M: Model>(mut self) -> Self {
        self.models.push(M::definition());
        self
    }

    pub fn model_def(mut self, def: ModelDef) -> Self {
        self.models.push(def);
        self
    }

    /// Build the manager, binding it when an application was supplied.
    ///
    /// Any failure drops the manager; no partially bound manager is returned.
    pub async fn build(self) -> CqlResult<Arc<CqlManager>> {
        let mut registry = ModelRegistry::new();
        for def in self.models {
            registry.register_def(def)?;
        }

        let manager = Arc::new(CqlManager {
            driver: self.driver,
            adapters: self.adapters,
            adapters_registered: AtomicBool::new(false),
            registry: RwLock::new(registry),
            app: RwLock::new(None),
            config: RwLock::new(None),
            keyspace: RwLock::new(None),
            state: Mutex::new(ConnectionState::Disconnected),
        });

        if let Some(app) = self.app {
            manager.init_app(app).await?;
        }

        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HOSTS_KEY, LAZY_CONNECT_KEY, RETRY_CONNECT_KEY};
    use crate::driver::{ClusterClient, DriverResult, MockDriver};
    use async_trait::async_trait;
    use core_config::MapSource;
    use serde_json::json;

    struct NullPart;

    #[async_trait]
    impl ClusterClient for NullPart {
        async fn shutdown(&self) -> DriverResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl DriverSession for NullPart {
        async fn execute(&self, _cql: &str) -> DriverResult<()> {
            Ok(())
        }

        async fn table_columns(&self, _keyspace: &str, _table: &str) -> DriverResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn release_version(&self) -> DriverResult<Option<String>> {
            Ok(Some("4.1.0".to_string()))
        }

        async fn shutdown(&self) -> DriverResult<()> {
            Ok(())
        }
    }

    fn live_connection() -> Connection {
        Connection::new(Arc::new(NullPart), Arc::new(NullPart))
    }

    fn app() -> MapSource {
        MapSource::new()
            .set(HOSTS_KEY, json!(["10.0.0.1"]))
            .set(KEYSPACE_KEY, "ks1")
    }

    #[tokio::test]
    async fn test_invalid_config_never_connects() {
        let mut driver = MockDriver::new();
        driver.expect_connect().never();

        let result = CqlManager::builder(Arc::new(driver))
            .app(Arc::new(app().set(HOSTS_KEY, json!([]))))
            .build()
            .await;

        assert!(matches!(result, Err(CqlError::NoConfig(_))));
    }

    #[tokio::test]
    async fn test_bind_passes_settings_to_driver() {
        let mut driver = MockDriver::new();
        driver
            .expect_connect()
            .withf(|settings| settings.hosts == vec!["10.0.0.1"] && settings.keyspace == "ks1")
            .times(1)
            .returning(|_| Ok(live_connection()));

        let manager = CqlManager::builder(Arc::new(driver))
            .app(Arc::new(app()))
            .build()
            .await
            .unwrap();

        assert_eq!(manager.status().await, ConnectionStatus::Connected);
        assert_eq!(manager.default_keyspace().await.as_deref(), Some("ks1"));
    }

    #[tokio::test]
    async fn test_driver_error_propagates_unchanged() {
        let mut driver = MockDriver::new();
        driver
            .expect_connect()
            .returning(|_| Err(DriverError::ConnectionFailed("connection refused".into())));

        let err = CqlManager::builder(Arc::new(driver))
            .app(Arc::new(app()))
            .build()
            .await
            .err()
            .unwrap();

        assert!(matches!(
            err,
            CqlError::Driver(DriverError::ConnectionFailed(ref msg)) if msg == "connection refused"
        ));
    }

    #[tokio::test]
    async fn test_retry_connect_defers_failure() {
        let mut driver = MockDriver::new();
        let mut seq = mockall::Sequence::new();
        driver
            .expect_connect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(DriverError::ConnectionFailed("timeout".into())));
        driver
            .expect_connect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(live_connection()));

        let manager = CqlManager::builder(Arc::new(driver))
            .app(Arc::new(app().set(RETRY_CONNECT_KEY, true)))
            .build()
            .await
            .unwrap();

        assert_eq!(manager.status().await, ConnectionStatus::Pending);
        assert!(manager.session().await.is_ok());
        assert_eq!(manager.status().await, ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_lazy_connect_waits_for_first_use() {
        let mut driver = MockDriver::new();
        driver
            .expect_connect()
            .times(1)
            .returning(|_| Ok(live_connection()));

        let manager = CqlManager::builder(Arc::new(driver))
            .app(Arc::new(app().set(LAZY_CONNECT_KEY, "true")))
            .build()
            .await
            .unwrap();

        assert_eq!(manager.status().await, ConnectionStatus::Pending);

        let health = manager.health().await;
        assert!(health.healthy);
        assert_eq!(health.version.as_deref(), Some("4.1.0"));
        assert_eq!(manager.status().await, ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_unbound_manager() {
        let mut driver = MockDriver::new();
        driver.expect_connect().never();

        let manager = CqlManager::builder(Arc::new(driver)).build().await.unwrap();

        assert!(matches!(manager.setup_connection().await, Err(CqlError::NotBound)));
        assert!(matches!(manager.set_keyspace(None).await, Err(CqlError::NotBound)));
        assert!(manager.shutdown_connection().await.is_ok());
        assert!(matches!(manager.session().await, Err(CqlError::NotConnected)));
        assert!(!manager.health().await.healthy);
    }

    #[tokio::test]
    async fn test_set_keyspace_round_trip() {
        let mut driver = MockDriver::new();
        driver.expect_connect().returning(|_| Ok(live_connection()));

        let manager = CqlManager::builder(Arc::new(driver))
            .app(Arc::new(app()))
            .build()
            .await
            .unwrap();

        manager.set_keyspace(Some("other")).await.unwrap();
        assert_eq!(manager.default_keyspace().await.as_deref(), Some("other"));

        manager.set_keyspace(Some("")).await.unwrap();
        assert_eq!(manager.default_keyspace().await.as_deref(), Some("ks1"));
    }
}
