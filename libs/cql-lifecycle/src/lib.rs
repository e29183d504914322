//! Connection lifecycle manager for Cassandra/ScyllaDB clients
//!
//! Binds a cluster connection to a host application: reads configuration from the
//! application, opens the connection, tears it down and re-opens it when the host
//! forks worker processes, and creates tables for every registered model.
//!
//! # Features
//!
//! - `scylla` (default) - Production driver backed by the `scylla` crate
//!
//! # Configuration keys
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `CASSANDRA_HOSTS` | Contact points, array or comma-separated (required, non-empty) |
//! | `CASSANDRA_KEYSPACE` | Default keyspace (required) |
//! | `CASSANDRA_CONSISTENCY` | Consistency name or numeric code (default `ONE`) |
//! | `CASSANDRA_LAZY_CONNECT` | Defer connecting until first use |
//! | `CASSANDRA_RETRY_CONNECT` | Defer a failed connect instead of failing |
//! | `CASSANDRA_SETUP_KWARGS` | Extra driver options (object) |
//!
//! # Examples
//!
//! ## Web server with prefork workers
//!
//! ```ignore
//! use cql_lifecycle::{CqlManager, PreforkAdapter, PreforkHooks, ScyllaDriver};
//! use core_config::EnvSource;
//!
//! let hooks = Arc::new(PreforkHooks::new());
//! let manager = CqlManager::builder(Arc::new(ScyllaDriver::new()))
//!     .adapter(PreforkAdapter::new(hooks.clone()))
//!     .app(Arc::new(EnvSource::new()))
//!     .build()
//!     .await?;
//!
//! // In each forked worker
//! hooks.post_fork.send().await?;
//! ```
//!
//! ## Schema sync
//!
//! ```ignore
//! manager.register_model::<Task>().await?;
//! for outcome in manager.sync_db().await? {
//!     tracing::info!(table = %outcome.table, created = outcome.created, "synced");
//! }
//! ```

pub mod config;
pub mod consistency;
pub mod driver;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod manager;
pub mod model;
pub mod schema;

pub use config::{CqlConfig, SetupOptions};
pub use consistency::Consistency;
pub use driver::{
    ClusterClient, ConnectSettings, Connection, Driver, DriverError, DriverResult, DriverSession,
};
pub use error::{CqlError, CqlResult};
pub use health::HealthStatus;
pub use lifecycle::{
    LifecycleAdapter, PreforkAdapter, PreforkHooks, Signal, TaskWorkerAdapter, TaskWorkerSignals,
};
pub use manager::{ConnectionStatus, CqlManager, CqlManagerBuilder};
pub use model::{BASE_MODEL, Model, ModelDef, ModelRegistry};
pub use schema::{
    ClusteringOrder, ColumnDef, ColumnType, SyncOutcome, TableSchema, UserTypeSchema,
};

#[cfg(feature = "scylla")]
pub use driver::{ScyllaCluster, ScyllaDriver, ScyllaSession};
