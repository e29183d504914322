//! Runs against a real cluster: `CASSANDRA_HOSTS=127.0.0.1:9042 cargo test -- --ignored`

use cql_lifecycle::{ColumnType, CqlManager, ScyllaDriver, TableSchema};
use std::sync::Arc;
use test_utils::{TestDataBuilder, app_source};

fn cluster_hosts() -> Vec<String> {
    std::env::var("CASSANDRA_HOSTS")
        .unwrap_or_else(|_| "127.0.0.1:9042".to_string())
        .split(',')
        .map(|h| h.trim().to_string())
        .collect()
}

#[tokio::test]
#[ignore] // Requires actual Cassandra
async fn test_sync_table_into_fresh_keyspace() {
    let builder = TestDataBuilder::from_test_name("test_sync_table_into_fresh_keyspace");
    let keyspace = builder.keyspace();
    let hosts = cluster_hosts();
    let hosts: Vec<&str> = hosts.iter().map(String::as_str).collect();

    let manager = CqlManager::builder(Arc::new(ScyllaDriver::new()))
        .app(Arc::new(app_source(&hosts, &keyspace)))
        .build()
        .await
        .unwrap();

    manager.create_keyspace_simple(&keyspace, 1).await.unwrap();

    let table = TableSchema::new(builder.table("readings"))
        .column("sensor_id", ColumnType::Uuid)
        .column("value", ColumnType::Double)
        .partition_key("sensor_id");

    let created = manager.sync_table(&table).await.unwrap();
    assert!(created.created);
    assert_eq!(created.keyspace, keyspace);

    let widened = table.column("unit", ColumnType::Text);
    let altered = manager.sync_table(&widened).await.unwrap();
    assert!(!altered.created);
    assert_eq!(altered.added_columns, vec!["unit".to_string()]);

    let session = manager.session().await.unwrap();
    session
        .execute(&format!("DROP KEYSPACE IF EXISTS \"{}\"", keyspace))
        .await
        .unwrap();
    manager.shutdown_connection().await.unwrap();
}
