use std::time::Instant;

use crate::driver::DriverSession;

/// Health check status for the cluster connection
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the database is healthy
    pub healthy: bool,
    /// Optional message (e.g., error details)
    pub message: Option<String>,
    /// Response time in milliseconds
    pub response_time_ms: u64,
    /// Cassandra release version (if available)
    pub version: Option<String>,
}

impl HealthStatus {
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
            response_time_ms: 0,
            version: None,
        }
    }
}

/// Probe the session with a `system.local` read
///
/// Returns timing information, version, and any error messages.
pub async fn check_health_detailed(session: &dyn DriverSession) -> HealthStatus {
    let start = Instant::now();

    match session.release_version().await {
        Ok(version) => HealthStatus {
            healthy: true,
            message: None,
            response_time_ms: start.elapsed().as_millis() as u64,
            version,
        },
        Err(e) => HealthStatus {
            healthy: false,
            message: Some(e.to_string()),
            response_time_ms: start.elapsed().as_millis() as u64,
            version: None,
        },
    }
}
