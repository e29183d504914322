use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::ConfigError;

/// A host application's configuration store
///
/// Implementors only provide raw lookup; the typed getters accept both native JSON
/// values and their string spellings, so the same keys work whether they come from
/// environment variables or from an in-memory settings map.
pub trait ConfigSource: Send + Sync {
    /// Raw value for `key`, if present
    fn get(&self, key: &str) -> Option<Value>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn get_string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(other) => Err(ConfigError::parse(
                key,
                format!("expected a string, got {}", other),
            )),
        }
    }

    /// Either a JSON array of strings or a comma-separated string
    fn get_list(&self, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim_start().starts_with('[') => {
                serde_json::from_str::<Vec<String>>(&s)
                    .map(Some)
                    .map_err(|e| ConfigError::parse(key, e))
            }
            Some(Value::String(s)) => Ok(Some(
                s.split(',')
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect(),
            )),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => Err(ConfigError::parse(
                        key,
                        format!("expected a list of strings, found {}", other),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(other) => Err(ConfigError::parse(
                key,
                format!("expected a list, got {}", other),
            )),
        }
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(Value::Number(n)) => match n.as_u64() {
                Some(0) => Ok(Some(false)),
                Some(1) => Ok(Some(true)),
                _ => Err(ConfigError::parse(key, format!("expected 0 or 1, got {}", n))),
            },
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Some(true)),
                "false" | "0" | "no" | "off" | "" => Ok(Some(false)),
                _ => Err(ConfigError::parse(key, format!("expected a boolean, got '{}'", s))),
            },
            Some(other) => Err(ConfigError::parse(
                key,
                format!("expected a boolean, got {}", other),
            )),
        }
    }

    /// Either a JSON object or a string holding one
    fn get_map(&self, key: &str) -> Result<Option<Map<String, Value>>, ConfigError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(Some(Map::new())),
            Some(Value::String(s)) => match serde_json::from_str::<Value>(&s) {
                Ok(Value::Object(map)) => Ok(Some(map)),
                Ok(other) => Err(ConfigError::parse(
                    key,
                    format!("expected a JSON object, got {}", other),
                )),
                Err(e) => Err(ConfigError::parse(key, e)),
            },
            Some(other) => Err(ConfigError::parse(
                key,
                format!("expected an object, got {}", other),
            )),
        }
    }
}

/// Configuration backed by the process environment
#[derive(Clone, Debug, Default)]
pub struct EnvSource {
    prefix: Option<String>,
}

impl EnvSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `prefix` to every key looked up, e.g. `MYAPP_` + `CASSANDRA_HOSTS`
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn var_name(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, key),
            None => key.to_string(),
        }
    }
}

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<Value> {
        std::env::var(self.var_name(key)).ok().map(Value::String)
    }
}

/// In-memory configuration, for hosts that keep their settings in a map
#[derive(Clone, Debug, Default)]
pub struct MapSource {
    values: BTreeMap<String, Value>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }
}
