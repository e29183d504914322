use core_config::{ConfigError, ConfigSource, EnvSource, FromEnv};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::consistency::Consistency;
use crate::error::{CqlError, CqlResult};

pub const HOSTS_KEY: &str = "CASSANDRA_HOSTS";
pub const KEYSPACE_KEY: &str = "CASSANDRA_KEYSPACE";
pub const CONSISTENCY_KEY: &str = "CASSANDRA_CONSISTENCY";
pub const LAZY_CONNECT_KEY: &str = "CASSANDRA_LAZY_CONNECT";
pub const RETRY_CONNECT_KEY: &str = "CASSANDRA_RETRY_CONNECT";
pub const SETUP_KWARGS_KEY: &str = "CASSANDRA_SETUP_KWARGS";

/// Extra driver setup options (`CASSANDRA_SETUP_KWARGS`)
///
/// Known keys are typed; anything else lands in `extra` and is reported by the
/// driver as ignored.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SetupOptions {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Native transport port for hosts given without one
    pub port: Option<u16>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub tcp_nodelay: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SetupOptions {
    pub fn is_empty(&self) -> bool {
        *self == SetupOptions::default()
    }
}

/// Cluster connection configuration read from the host application
///
/// # Example
///
/// ```ignore
/// use cql_lifecycle::{Consistency, CqlConfig};
///
/// let config = CqlConfig::new(vec!["10.0.0.1:9042"], "ks1")
///     .with_consistency(Consistency::LocalQuorum)
///     .with_lazy_connect(true);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CqlConfig {
    /// Contact points (host or host:port)
    pub hosts: Vec<String>,

    /// Keyspace the session and the mapping layer start in
    pub keyspace: String,

    /// Default consistency for every statement (default: ONE)
    pub consistency: Consistency,

    /// Defer contacting the cluster until a session is first needed
    pub lazy_connect: bool,

    /// Keep going when the initial connect fails and retry on first use
    pub retry_connect: bool,

    pub setup_options: SetupOptions,
}

impl CqlConfig {
    pub fn new<S: Into<String>>(hosts: Vec<S>, keyspace: impl Into<String>) -> Self {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            keyspace: keyspace.into(),
            consistency: Consistency::default(),
            lazy_connect: false,
            retry_connect: false,
            setup_options: SetupOptions::default(),
        }
    }

    pub fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn with_lazy_connect(mut self, lazy: bool) -> Self {
        self.lazy_connect = lazy;
        self
    }

    pub fn with_retry_connect(mut self, retry: bool) -> Self {
        self.retry_connect = retry;
        self
    }

    pub fn with_setup_options(mut self, options: SetupOptions) -> Self {
        self.setup_options = options;
        self
    }

    /// Read and validate configuration from a host application's store.
    ///
    /// Missing or empty hosts/keyspace yield [`CqlError::NoConfig`]; unparseable
    /// optional values yield [`CqlError::Config`].
    pub fn from_source(source: &dyn ConfigSource) -> CqlResult<Self> {
        let config = Self::read(source).map_err(|e| match e {
            ConfigError::MissingKey(key) => {
                CqlError::NoConfig(format!("{} must be supplied", key))
            }
            other => CqlError::Config(other),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// An empty host list is never accepted, whatever the keyspace holds.
    pub fn validate(&self) -> CqlResult<()> {
        if self.hosts.is_empty() {
            return Err(CqlError::NoConfig(format!(
                "{} must list at least one host",
                HOSTS_KEY
            )));
        }
        if self.keyspace.trim().is_empty() {
            return Err(CqlError::NoConfig(format!(
                "{} must not be empty",
                KEYSPACE_KEY
            )));
        }
        Ok(())
    }

    fn read(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let hosts = source
            .get_list(HOSTS_KEY)?
            .ok_or_else(|| ConfigError::MissingKey(HOSTS_KEY.to_string()))?;

        let keyspace = source
            .get_string(KEYSPACE_KEY)?
            .ok_or_else(|| ConfigError::MissingKey(KEYSPACE_KEY.to_string()))?;

        let consistency = match source.get_string(CONSISTENCY_KEY)? {
            Some(raw) => Consistency::parse(&raw).ok_or_else(|| {
                ConfigError::parse(CONSISTENCY_KEY, format!("unknown consistency level '{}'", raw))
            })?,
            None => Consistency::default(),
        };

        let lazy_connect = source.get_bool(LAZY_CONNECT_KEY)?.unwrap_or(false);
        let retry_connect = source.get_bool(RETRY_CONNECT_KEY)?.unwrap_or(false);

        let setup_options = match source.get_map(SETUP_KWARGS_KEY)? {
            Some(map) => serde_json::from_value(Value::Object(map))
                .map_err(|e| ConfigError::parse(SETUP_KWARGS_KEY, e))?,
            None => SetupOptions::default(),
        };

        Ok(Self {
            hosts,
            keyspace,
            consistency,
            lazy_connect,
            retry_connect,
            setup_options,
        })
    }
}

/// Load CqlConfig from environment variables
///
/// - `CASSANDRA_HOSTS` (required) - comma-separated contact points
/// - `CASSANDRA_KEYSPACE` (required)
/// - `CASSANDRA_CONSISTENCY` (optional, default: ONE) - level name or protocol code
/// - `CASSANDRA_LAZY_CONNECT` (optional, default: false)
/// - `CASSANDRA_RETRY_CONNECT` (optional, default: false)
/// - `CASSANDRA_SETUP_KWARGS` (optional) - JSON object of driver options
impl FromEnv for CqlConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let config = Self::read(&EnvSource::new()).map_err(|e| match e {
            ConfigError::MissingKey(key) => ConfigError::MissingEnvVar(key),
            other => other,
        })?;

        if config.hosts.is_empty() {
            return Err(ConfigError::parse(HOSTS_KEY, "No valid hosts provided"));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_config::MapSource;
    use serde_json::json;

    fn minimal() -> MapSource {
        MapSource::new()
            .set(HOSTS_KEY, json!(["10.0.0.1"]))
            .set(KEYSPACE_KEY, "ks1")
    }

    #[test]
    fn test_defaults_applied() {
        let config = CqlConfig::from_source(&minimal()).unwrap();
        assert_eq!(config.hosts, vec!["10.0.0.1"]);
        assert_eq!(config.keyspace, "ks1");
        assert_eq!(config.consistency, Consistency::One);
        assert!(!config.lazy_connect);
        assert!(!config.retry_connect);
        assert!(config.setup_options.is_empty());
    }

    #[test]
    fn test_optional_values_read() {
        let source = minimal()
            .set(CONSISTENCY_KEY, 6)
            .set(LAZY_CONNECT_KEY, true)
            .set(RETRY_CONNECT_KEY, "yes")
            .set(
                SETUP_KWARGS_KEY,
                json!({
                    "username": "cassandra",
                    "port": 9142,
                    "connect_timeout_secs": 3,
                    "protocol_version": 4
                }),
            );

        let config = CqlConfig::from_source(&source).unwrap();
        assert_eq!(config.consistency, Consistency::LocalQuorum);
        assert!(config.lazy_connect);
        assert!(config.retry_connect);
        assert_eq!(config.setup_options.username.as_deref(), Some("cassandra"));
        assert_eq!(config.setup_options.port, Some(9142));
        assert_eq!(config.setup_options.connect_timeout_secs, Some(3));
        assert!(!config.setup_options.extra.contains_key("port"));
        assert_eq!(
            config.setup_options.extra.get("protocol_version"),
            Some(&json!(4))
        );
    }

    #[test]
    fn test_empty_hosts_is_no_config() {
        let source = minimal().set(HOSTS_KEY, json!([]));
        let err = CqlConfig::from_source(&source).unwrap_err();
        assert!(matches!(err, CqlError::NoConfig(_)));

        // Keyspace content does not matter once hosts are empty
        let source = source.set(KEYSPACE_KEY, "");
        assert!(matches!(
            CqlConfig::from_source(&source).unwrap_err(),
            CqlError::NoConfig(_)
        ));
    }

    #[test]
    fn test_missing_required_keys() {
        let mut source = minimal();
        source.remove(KEYSPACE_KEY);
        let err = CqlConfig::from_source(&source).unwrap_err();
        assert!(matches!(err, CqlError::NoConfig(ref msg) if msg.contains(KEYSPACE_KEY)));

        let source = MapSource::new().set(KEYSPACE_KEY, "ks1");
        let err = CqlConfig::from_source(&source).unwrap_err();
        assert!(matches!(err, CqlError::NoConfig(ref msg) if msg.contains(HOSTS_KEY)));
    }

    #[test]
    fn test_bad_optional_values() {
        let source = minimal().set(CONSISTENCY_KEY, "MOSTLY");
        assert!(matches!(
            CqlConfig::from_source(&source).unwrap_err(),
            CqlError::Config(ConfigError::ParseError { .. })
        ));

        let source = minimal().set(SETUP_KWARGS_KEY, json!({"connect_timeout_secs": "soon"}));
        assert!(matches!(
            CqlConfig::from_source(&source).unwrap_err(),
            CqlError::Config(_)
        ));
    }

    #[test]
    fn test_builder() {
        let config = CqlConfig::new(vec!["127.0.0.1:9042"], "app")
            .with_consistency(Consistency::Quorum)
            .with_lazy_connect(true)
            .with_retry_connect(true);
        assert_eq!(config.consistency, Consistency::Quorum);
        assert!(config.lazy_connect && config.retry_connect);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env() {
        temp_env::with_vars(
            [
                (HOSTS_KEY, Some("10.0.0.1:9042,10.0.0.2:9042")),
                (KEYSPACE_KEY, Some("ks_env")),
                (CONSISTENCY_KEY, Some("quorum")),
                (LAZY_CONNECT_KEY, None),
                (RETRY_CONNECT_KEY, None),
                (SETUP_KWARGS_KEY, Some(r#"{"tcp_nodelay": true}"#)),
            ],
            || {
                let config = CqlConfig::from_env().unwrap();
                assert_eq!(config.hosts.len(), 2);
                assert_eq!(config.keyspace, "ks_env");
                assert_eq!(config.consistency, Consistency::Quorum);
                assert_eq!(config.setup_options.tcp_nodelay, Some(true));
            },
        );
    }

    #[test]
    fn test_from_env_missing_hosts() {
        temp_env::with_vars(
            [(HOSTS_KEY, None::<&str>), (KEYSPACE_KEY, Some("ks"))],
            || {
                let err = CqlConfig::from_env().unwrap_err();
                assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == HOSTS_KEY));
            },
        );

        temp_env::with_vars([(HOSTS_KEY, Some(" , ")), (KEYSPACE_KEY, Some("ks"))], || {
            assert!(CqlConfig::from_env().is_err());
        });
    }
}
