//! CQL Worker Service
//!
//! A background worker whose Cassandra connection follows the task framework's
//! process lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//! CASSANDRA_* env ──► CqlManager::build (bind + connect)
//!   ↓ worker_process_init
//! setup_connection (fresh connection for this process)
//!   ↓
//! create keyspace (optional) → sync user types → sync_db
//!   ↓ SIGINT / SIGTERM
//! worker_shutting_down ──► shutdown_connection
//! ```
//!
//! ## Environment
//!
//! - `CASSANDRA_*` - see `cql_lifecycle`
//! - `CQL_WORKER_REPLICATION_FACTOR` - when set, creates the keyspace with
//!   SimpleStrategy before syncing

pub mod models;

use core_config::{EnvSource, Environment, env_or_default};
use cql_lifecycle::{CqlManager, ScyllaDriver, TaskWorkerAdapter, TaskWorkerSignals};
use eyre::{Result, WrapErr};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use crate::models::{Event, ProjectEvent, Task, TaskEvent, tag_type};

/// Run the worker
///
/// 1. Sets up error reports and structured logging (JSON for prod, pretty for dev)
/// 2. Binds the connection manager to the environment
/// 3. Fires the worker init signal and synchronizes the schema
/// 4. Waits for a shutdown signal and disconnects
///
/// # Errors
///
/// Returns an error if configuration is missing, the cluster is unreachable, or a
/// schema statement fails.
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    info!(environment = ?environment, "Starting CQL worker");

    let signals = Arc::new(TaskWorkerSignals::new());
    let manager = CqlManager::builder(Arc::new(ScyllaDriver::new()))
        .adapter(TaskWorkerAdapter::new(signals.clone()))
        .model::<Task>()
        .model::<Event>()
        .model::<TaskEvent>()
        .model::<ProjectEvent>()
        .app(Arc::new(EnvSource::new()))
        .build()
        .await
        .wrap_err("Failed to bind Cassandra connection manager")?;

    signals
        .worker_process_init
        .send()
        .await
        .wrap_err("Worker init hook failed")?;

    sync_schema(&manager).await?;

    let health = manager.health().await;
    if health.healthy {
        info!(
            version = ?health.version,
            response_time_ms = health.response_time_ms,
            "Cassandra is healthy"
        );
    } else {
        warn!(message = ?health.message, "Cassandra health check failed");
    }

    shutdown_signal().await?;

    signals
        .worker_shutting_down
        .send()
        .await
        .wrap_err("Worker shutdown hook failed")?;

    info!("CQL worker stopped");
    Ok(())
}

async fn sync_schema(manager: &CqlManager) -> Result<()> {
    let replication = env_or_default("CQL_WORKER_REPLICATION_FACTOR", "");
    if !replication.is_empty() {
        let factor: u32 = replication
            .parse()
            .wrap_err("CQL_WORKER_REPLICATION_FACTOR must be a positive integer")?;
        let keyspace = manager
            .default_keyspace()
            .await
            .ok_or_else(|| eyre::eyre!("No default keyspace"))?;
        manager
            .create_keyspace_simple(&keyspace, factor)
            .await
            .wrap_err_with(|| format!("Failed to create keyspace {}", keyspace))?;
    }

    manager
        .sync_type(&tag_type())
        .await
        .wrap_err("Failed to sync user types")?;

    let outcomes = manager.sync_db().await.wrap_err("Failed to sync tables")?;
    for outcome in &outcomes {
        info!(
            keyspace = %outcome.keyspace,
            table = %outcome.table,
            created = outcome.created,
            added_columns = ?outcome.added_columns,
            "Table in sync"
        );
    }

    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .wrap_err("Failed to install Ctrl+C handler")
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .wrap_err("Failed to install signal handler")?
            .recv()
            .await;
        Ok::<(), eyre::Report>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            info!("Received Ctrl+C, initiating shutdown...");
        },
        result = terminate => {
            result?;
            info!("Received SIGTERM, initiating shutdown...");
        },
    }

    Ok(())
}
