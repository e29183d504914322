//! Shared test utilities for the lifecycle manager
//!
//! This crate provides reusable test infrastructure:
//! - `RecordingDriver`: in-memory driver that records every connect, shutdown and
//!   statement, so tests can assert on teardown order and handle counts
//! - `TestDataBuilder`: deterministic keyspace and table names
//! - `app_source`: a host configuration store with hosts and keyspace filled in
//!
//! # Usage
//!
//! ```rust,ignore
//! use test_utils::{RecordingDriver, app_source};
//!
//! #[tokio::test]
//! async fn my_lifecycle_test() {
//!     let driver = RecordingDriver::new();
//!     let manager = CqlManager::builder(Arc::new(driver.clone()))
//!         .app(Arc::new(app_source(&["10.0.0.1"], "ks1")))
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(driver.live_handles(), 1);
//! }
//! ```

use async_trait::async_trait;
use core_config::MapSource;
use cql_lifecycle::config::{HOSTS_KEY, KEYSPACE_KEY};
use cql_lifecycle::{
    ClusterClient, ConnectSettings, Connection, Driver, DriverError, DriverResult, DriverSession,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

/// Something the driver was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Connect {
        id: usize,
        hosts: Vec<String>,
        keyspace: String,
    },
    ClusterShutdown(usize),
    SessionShutdown(usize),
    Execute {
        id: usize,
        cql: String,
    },
}

#[derive(Default)]
struct State {
    events: Vec<DriverEvent>,
    next_id: usize,
    attempts: usize,
    failures_left: usize,
    open_clusters: BTreeSet<usize>,
    open_sessions: BTreeSet<usize>,
    tables: BTreeMap<(String, String), Vec<String>>,
}

/// In-memory [`Driver`] that records what the manager does with it
///
/// Clones share the same log, so keep one clone and hand another to the manager.
#[derive(Clone, Default)]
pub struct RecordingDriver {
    state: Arc<Mutex<State>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` connect attempts fail with `ConnectionFailed`
    pub fn fail_next_connects(&self, n: usize) {
        self.lock().failures_left = n;
    }

    /// Pretend `keyspace.table` already exists with these columns
    pub fn with_existing_columns(self, keyspace: &str, table: &str, columns: &[&str]) -> Self {
        self.lock().tables.insert(
            (keyspace.to_string(), table.to_string()),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub fn events(&self) -> Vec<DriverEvent> {
        self.lock().events.clone()
    }

    /// Successful connects so far
    pub fn connect_count(&self) -> usize {
        self.lock()
            .events
            .iter()
            .filter(|e| matches!(e, DriverEvent::Connect { .. }))
            .count()
    }

    /// Connect attempts so far, failed ones included
    pub fn connect_attempts(&self) -> usize {
        self.lock().attempts
    }

    /// Connections with a cluster or session part not yet shut down
    pub fn live_handles(&self) -> usize {
        let state = self.lock();
        state.open_clusters.union(&state.open_sessions).count()
    }

    /// Statements executed, in order
    pub fn executed(&self) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                DriverEvent::Execute { cql, .. } => Some(cql.clone()),
                _ => None,
            })
            .collect()
    }

    /// Keyspace passed to the most recent successful connect
    pub fn last_keyspace(&self) -> Option<String> {
        self.lock().events.iter().rev().find_map(|e| match e {
            DriverEvent::Connect { keyspace, .. } => Some(keyspace.clone()),
            _ => None,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("recording driver lock poisoned")
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    async fn connect(&self, settings: &ConnectSettings) -> DriverResult<Connection> {
        let mut state = self.lock();
        state.attempts += 1;

        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(DriverError::ConnectionFailed("connection refused".to_string()));
        }

        let id = state.next_id;
        state.next_id += 1;
        state.open_clusters.insert(id);
        state.open_sessions.insert(id);
        state.events.push(DriverEvent::Connect {
            id,
            hosts: settings.hosts.clone(),
            keyspace: settings.keyspace.clone(),
        });
        drop(state);

        let part = Arc::new(RecordingPart {
            id,
            state: self.state.clone(),
        });
        Ok(Connection::new(part.clone(), part))
    }
}

struct RecordingPart {
    id: usize,
    state: Arc<Mutex<State>>,
}

impl RecordingPart {
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("recording driver lock poisoned")
    }
}

#[async_trait]
impl ClusterClient for RecordingPart {
    async fn shutdown(&self) -> DriverResult<()> {
        let mut state = self.lock();
        state.open_clusters.remove(&self.id);
        state.events.push(DriverEvent::ClusterShutdown(self.id));
        Ok(())
    }
}

#[async_trait]
impl DriverSession for RecordingPart {
    async fn execute(&self, cql: &str) -> DriverResult<()> {
        let mut state = self.lock();
        if !state.open_sessions.contains(&self.id) {
            return Err(DriverError::SessionClosed);
        }
        state.events.push(DriverEvent::Execute {
            id: self.id,
            cql: cql.to_string(),
        });
        Ok(())
    }

    async fn table_columns(&self, keyspace: &str, table: &str) -> DriverResult<Vec<String>> {
        Ok(self
            .lock()
            .tables
            .get(&(keyspace.to_string(), table.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn release_version(&self) -> DriverResult<Option<String>> {
        if self.lock().open_sessions.contains(&self.id) {
            Ok(Some("4.1.0".to_string()))
        } else {
            Err(DriverError::SessionClosed)
        }
    }

    async fn shutdown(&self) -> DriverResult<()> {
        let mut state = self.lock();
        state.open_sessions.remove(&self.id);
        state.events.push(DriverEvent::SessionShutdown(self.id));
        Ok(())
    }
}

/// Host configuration with `CASSANDRA_HOSTS` and `CASSANDRA_KEYSPACE` set
pub fn app_source(hosts: &[&str], keyspace: &str) -> MapSource {
    MapSource::new()
        .set(HOSTS_KEY, serde_json::json!(hosts))
        .set(KEYSPACE_KEY, keyspace)
}

/// Builder for test data with deterministic names
///
/// Names derived from the test name stay stable across runs, so tests against a
/// shared cluster do not collide.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_sync_creates_table");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Keyspace name valid for CQL (letters, digits, underscore; at most 48 chars)
    pub fn keyspace(&self) -> String {
        format!("test_ks_{:x}", self.seed)
    }

    pub fn table(&self, prefix: &str) -> String {
        format!("{}_{:x}", prefix, self.seed & 0xffff_ffff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cql_lifecycle::Consistency;
    use cql_lifecycle::SetupOptions;

    fn settings() -> ConnectSettings {
        ConnectSettings {
            hosts: vec!["10.0.0.1".to_string()],
            keyspace: "ks1".to_string(),
            consistency: Consistency::One,
            options: SetupOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_recording_driver_tracks_handles() {
        let driver = RecordingDriver::new();
        let connection = driver.connect(&settings()).await.unwrap();

        assert_eq!(driver.live_handles(), 1);
        assert_eq!(driver.last_keyspace().as_deref(), Some("ks1"));

        connection.shutdown().await.unwrap();
        assert_eq!(driver.live_handles(), 0);
        assert_eq!(
            driver.events(),
            vec![
                DriverEvent::Connect {
                    id: 0,
                    hosts: vec!["10.0.0.1".to_string()],
                    keyspace: "ks1".to_string(),
                },
                DriverEvent::ClusterShutdown(0),
                DriverEvent::SessionShutdown(0),
            ]
        );
    }

    #[tokio::test]
    async fn test_recording_driver_failures() {
        let driver = RecordingDriver::new();
        driver.fail_next_connects(1);

        assert!(driver.connect(&settings()).await.is_err());
        assert!(driver.connect(&settings()).await.is_ok());
        assert_eq!(driver.connect_attempts(), 2);
        assert_eq!(driver.connect_count(), 1);
    }

    #[test]
    fn test_data_builder_deterministic() {
        let a = TestDataBuilder::from_test_name("my_test");
        let b = TestDataBuilder::from_test_name("my_test");
        let c = TestDataBuilder::from_test_name("other_test");

        assert_eq!(a.keyspace(), b.keyspace());
        assert_ne!(a.keyspace(), c.keyspace());
        assert!(a.keyspace().len() <= 48);
    }
}
