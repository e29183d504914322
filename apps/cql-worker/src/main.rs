//! CQL Worker - Entry Point
//!
//! Background worker that binds the Cassandra connection lifecycle and keeps the
//! schema of its models in sync.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    cql_worker::run().await
}
