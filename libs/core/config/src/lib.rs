//! Shared configuration primitives
//!
//! - [`Environment`] decides log format and other dev/prod switches (`APP_ENV`)
//! - [`FromEnv`] is implemented by config records that load from the process environment
//! - [`ConfigSource`] abstracts a host application's key/value configuration store
//! - [`tracing::init_tracing`] installs the subscriber used by every binary

pub mod source;
pub mod tracing;

pub use source::{ConfigSource, EnvSource, MapSource};

use std::env;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Configuration key '{0}' is required but not set")]
    MissingKey(String),

    #[error("Failed to parse configuration value '{key}': {details}")]
    ParseError { key: String, details: String },
}

impl ConfigError {
    pub fn parse(key: impl Into<String>, details: impl ToString) -> Self {
        ConfigError::ParseError {
            key: key.into(),
            details: details.to_string(),
        }
    }
}

/// Application environment
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        let app_env = env_or_default("APP_ENV", "development");

        if app_env.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// Read an environment variable, falling back to `default` when unset
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_defaults_to_development() {
        temp_env::with_var_unset("APP_ENV", || {
            let env = Environment::from_env();
            assert_eq!(env, Environment::Development);
            assert!(env.is_development());
            assert!(!env.is_production());
        });
    }

    #[test]
    fn test_environment_production_case_insensitive() {
        temp_env::with_var("APP_ENV", Some("PRODUCTION"), || {
            assert_eq!(Environment::from_env(), Environment::Production);
        });

        temp_env::with_var("APP_ENV", Some("staging"), || {
            assert_eq!(Environment::from_env(), Environment::Development);
        });
    }

    #[test]
    fn test_env_or_default() {
        temp_env::with_var("CQL_TEST_VAR", Some("value"), || {
            assert_eq!(env_or_default("CQL_TEST_VAR", "default"), "value");
        });
        temp_env::with_var_unset("CQL_TEST_VAR", || {
            assert_eq!(env_or_default("CQL_TEST_VAR", "default"), "default");
        });
    }

    #[test]
    fn test_parse_error_message() {
        let err = ConfigError::parse("CASSANDRA_LAZY_CONNECT", "expected a boolean");
        assert_eq!(
            err.to_string(),
            "Failed to parse configuration value 'CASSANDRA_LAZY_CONNECT': expected a boolean"
        );
    }
}
