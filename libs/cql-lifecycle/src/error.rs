use core_config::ConfigError;

use crate::driver::DriverError;

/// Errors raised by the lifecycle manager
///
/// Driver failures are wrapped transparently: the manager never masks or rewords a
/// connectivity error coming from the cluster.
#[derive(Debug, thiserror::Error)]
pub enum CqlError {
    /// Required configuration is missing or empty. Fatal to binding.
    #[error("No configuration options defined: {0}")]
    NoConfig(String),

    /// A configuration value was present but could not be parsed
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Error raised by the underlying driver, unchanged
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Invalid table or type definition
    #[error("Schema error: {0}")]
    Schema(String),

    /// A model with the same name is already registered
    #[error("Model '{0}' is already registered")]
    DuplicateModel(String),

    /// The operation needs configuration but `init_app` has not run
    #[error("Manager is not bound to an application")]
    NotBound,

    /// No connection is open and none is pending
    #[error("Not connected; call setup_connection first")]
    NotConnected,

    /// A lifecycle hook failed
    #[error("Lifecycle hook '{hook}' failed: {source}")]
    Hook {
        hook: String,
        #[source]
        source: Box<CqlError>,
    },
}

impl CqlError {
    pub fn schema(message: impl Into<String>) -> Self {
        CqlError::Schema(message.into())
    }

    /// Whether this error came from the driver (possibly through a hook)
    pub fn is_driver_error(&self) -> bool {
        match self {
            CqlError::Driver(_) => true,
            CqlError::Hook { source, .. } => source.is_driver_error(),
            _ => false,
        }
    }
}

/// Result type alias for lifecycle operations
pub type CqlResult<T> = Result<T, CqlError>;
