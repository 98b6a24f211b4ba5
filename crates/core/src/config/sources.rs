use std::collections::HashMap;
use std::env;

use crate::config::ConfigError;

/// Read-only key-value view over a configuration source.
///
/// Keys are dotted paths such as `sqlite.db_name`.
pub trait ConfigAccessor {
    /// Look up a raw string value
    fn get(&self, key: &str) -> Option<String>;

    /// Describe where a key would be read from
    fn source(&self, key: &str) -> ConfigSource;

    /// Whether any key under the given section prefix is present
    fn has_section(&self, section: &str, keys: &[&str]) -> bool {
        keys.iter()
            .any(|key| self.get(&format!("{}.{}", section, key)).is_some())
    }
}

/// Where a configuration value was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    EnvVar(String),
    /// In-memory map or parsed document, by dotted key
    Map(String),
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::EnvVar(var) => write!(f, "environment variable {}", var),
            ConfigSource::Map(key) => write!(f, "configuration key {}", key),
            ConfigSource::Default => write!(f, "default value"),
        }
    }
}

/// Accessor backed by a plain string map
#[derive(Debug, Clone, Default)]
pub struct MapAccessor {
    values: HashMap<String, String>,
}

impl MapAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Build an accessor from a YAML document, flattening nested mappings
    /// into dotted keys.
    pub fn from_yaml_str(document: &str) -> Result<Self, ConfigError> {
        let root: serde_yaml::Value = serde_yaml::from_str(document)?;
        let mut values = HashMap::new();
        flatten_yaml("", &root, &mut values)?;
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<HashMap<String, String>> for MapAccessor {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl ConfigAccessor for MapAccessor {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn source(&self, key: &str) -> ConfigSource {
        if self.values.contains_key(key) {
            ConfigSource::Map(key.to_string())
        } else {
            ConfigSource::Default
        }
    }
}

impl ConfigAccessor for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }

    fn source(&self, key: &str) -> ConfigSource {
        if self.contains_key(key) {
            ConfigSource::Map(key.to_string())
        } else {
            ConfigSource::Default
        }
    }
}

fn flatten_yaml(
    prefix: &str,
    value: &serde_yaml::Value,
    out: &mut HashMap<String, String>,
) -> Result<(), ConfigError> {
    match value {
        serde_yaml::Value::Mapping(mapping) => {
            for (key, nested) in mapping {
                let key = key
                    .as_str()
                    .ok_or_else(|| ConfigError::parsing("configuration keys must be strings"))?;
                let path = if prefix.is_empty() {
                    key.to_string()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_yaml(&path, nested, out)?;
            }
        }
        serde_yaml::Value::Null => {}
        serde_yaml::Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        serde_yaml::Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        serde_yaml::Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            return Err(ConfigError::parsing(format!(
                "unsupported value for '{}': {:?}",
                prefix, other
            )))
        }
    }
    Ok(())
}

/// Accessor reading environment variables: `sqlite.db_name` with prefix
/// `TESSERA` is read from `TESSERA_SQLITE_DB_NAME`.
#[derive(Debug, Clone)]
pub struct EnvAccessor {
    prefix: String,
}

impl EnvAccessor {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment variable name for a dotted key
    pub fn var_name(&self, key: &str) -> String {
        let suffix = key.replace('.', "_").to_uppercase();
        if self.prefix.is_empty() {
            suffix
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }
}

impl Default for EnvAccessor {
    fn default() -> Self {
        Self::new("TESSERA")
    }
}

impl ConfigAccessor for EnvAccessor {
    fn get(&self, key: &str) -> Option<String> {
        env::var(self.var_name(key)).ok()
    }

    fn source(&self, key: &str) -> ConfigSource {
        let var = self.var_name(key);
        if env::var(&var).is_ok() {
            ConfigSource::EnvVar(var)
        } else {
            ConfigSource::Default
        }
    }
}
