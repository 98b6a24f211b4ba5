//! Typed ORM configuration resolved from a [`ConfigAccessor`].

use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{
    ConfigAccessor, ConfigError, ConfigValidator, EnvAccessor, MapAccessor, RangeValidator,
    UrlValidator,
};

/// Default number of models a session keeps in its identity cache
pub const DEFAULT_CACHE_SIZE: usize = 500;

/// Default REST connection and response timeout
pub const DEFAULT_REST_TIMEOUT: Duration = Duration::from_secs(10);

/// How entity metadata is discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationMode {
    /// Metadata declared alongside the model's field registration
    Annotations,
    /// Metadata read from mapping documents
    Mapped,
}

impl FromStr for ConfigurationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "annotations" | "annotation" => Ok(ConfigurationMode::Annotations),
            "xml" | "mapped" | "map" => Ok(ConfigurationMode::Mapped),
            _ => Err(ConfigError::invalid_value(
                "mode",
                s,
                "annotations or xml",
            )),
        }
    }
}

impl std::fmt::Display for ConfigurationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigurationMode::Annotations => write!(f, "annotations"),
            ConfigurationMode::Mapped => write!(f, "xml"),
        }
    }
}

/// Payload format used by the REST session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Json,
    NameValue,
}

impl FromStr for MessageType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(MessageType::Json),
            "name-value" | "name_value" | "namevalue" | "form" => Ok(MessageType::NameValue),
            _ => Err(ConfigError::invalid_value(
                "rest.message_type",
                s,
                "json or name-value",
            )),
        }
    }
}

/// SQLite datastore settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// Database file name, or `:memory:`
    pub db_name: String,
    pub db_version: u32,
    pub generate_schema: bool,
    pub autocommit: bool,
}

impl SqliteConfig {
    /// In-memory database with schema generation and autocommit enabled
    pub fn in_memory() -> Self {
        Self {
            db_name: ":memory:".to_string(),
            db_version: 1,
            generate_schema: true,
            autocommit: true,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_name == ":memory:"
    }
}

/// REST datastore settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestConfig {
    pub host: String,
    pub connection_timeout: Duration,
    pub response_timeout: Duration,
    pub message_type: MessageType,
}

impl RestConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            connection_timeout: DEFAULT_REST_TIMEOUT,
            response_timeout: DEFAULT_REST_TIMEOUT,
            message_type: MessageType::Json,
        }
    }
}

/// Session settings shared by every datastore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub cache_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

/// Complete ORM configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrmConfig {
    pub mode: ConfigurationMode,
    pub sqlite: Option<SqliteConfig>,
    pub rest: Option<RestConfig>,
    pub session: SessionConfig,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            mode: ConfigurationMode::Annotations,
            sqlite: None,
            rest: None,
            session: SessionConfig::default(),
        }
    }
}

impl OrmConfig {
    /// Configuration for an in-memory SQLite datastore
    pub fn in_memory() -> Self {
        Self {
            sqlite: Some(SqliteConfig::in_memory()),
            ..Self::default()
        }
    }

    /// Resolve configuration from any key-value accessor
    pub fn from_accessor(accessor: &dyn ConfigAccessor) -> Result<Self, ConfigError> {
        let mode = setting(accessor, "mode", str::parse::<ConfigurationMode>)?
            .unwrap_or(ConfigurationMode::Annotations);

        let sqlite = if accessor.has_section(
            "sqlite",
            &["db_name", "db_version", "generate_schema", "autocommit"],
        ) {
            Some(Self::sqlite_from(accessor)?)
        } else {
            None
        };

        let rest = if accessor.has_section(
            "rest",
            &["host", "connection_timeout", "response_timeout", "message_type"],
        ) {
            Some(Self::rest_from(accessor)?)
        } else {
            None
        };

        let mut session = SessionConfig::default();
        let cache_size = setting(accessor, "session.cache_size", |raw| {
            let size = parse_number("session.cache_size", raw)?;
            RangeValidator {
                field: "session.cache_size",
                min: 1,
                max: u32::MAX as u64,
            }
            .validate(&size)?;
            Ok(size)
        })?;
        if let Some(size) = cache_size {
            session.cache_size = size as usize;
        }

        let config = Self {
            mode,
            sqlite,
            rest,
            session,
        };
        debug!("Resolved ORM configuration: {:?}", config);
        Ok(config)
    }

    /// Resolve configuration from `TESSERA_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_accessor(&EnvAccessor::default())
    }

    /// Resolve configuration from a YAML document
    pub fn from_yaml_str(document: &str) -> Result<Self, ConfigError> {
        Self::from_accessor(&MapAccessor::from_yaml_str(document)?)
    }

    /// Autocommit flag; false when no SQLite datastore is declared
    pub fn autocommit(&self) -> bool {
        self.sqlite.as_ref().map_or(false, |s| s.autocommit)
    }

    /// Schema generation flag; false when no SQLite datastore is declared
    pub fn generate_schema(&self) -> bool {
        self.sqlite.as_ref().map_or(false, |s| s.generate_schema)
    }

    fn sqlite_from(accessor: &dyn ConfigAccessor) -> Result<SqliteConfig, ConfigError> {
        let db_name = accessor.get("sqlite.db_name").ok_or_else(|| {
            warn!("SQLite datastore declared without a database name");
            ConfigError::missing_required(
                "sqlite.db_name",
                "A SQLite datastore requires a database name",
            )
        })?;
        let db_version = setting(accessor, "sqlite.db_version", |raw| {
            let version = parse_number("sqlite.db_version", raw)?;
            RangeValidator {
                field: "sqlite.db_version",
                min: 1,
                max: i32::MAX as u64,
            }
            .validate(&version)?;
            Ok(version)
        })?
        .ok_or_else(|| {
            ConfigError::missing_required(
                "sqlite.db_version",
                "A SQLite datastore requires a database version",
            )
        })?;

        Ok(SqliteConfig {
            db_name,
            db_version: db_version as u32,
            generate_schema: parse_flag(accessor, "sqlite.generate_schema", true)?,
            autocommit: parse_flag(accessor, "sqlite.autocommit", true)?,
        })
    }

    fn rest_from(accessor: &dyn ConfigAccessor) -> Result<RestConfig, ConfigError> {
        let host = accessor.get("rest.host").ok_or_else(|| {
            ConfigError::missing_required("rest.host", "A REST datastore requires a host URL")
        })?;
        UrlValidator::default()
            .validate(&host)
            .map_err(|e| e.with_origin(accessor.source("rest.host")))?;

        let mut rest = RestConfig::new(host.trim_end_matches('/'));
        if let Some(millis) = setting(accessor, "rest.connection_timeout", |raw| {
            parse_number("rest.connection_timeout", raw)
        })? {
            rest.connection_timeout = Duration::from_millis(millis);
        }
        if let Some(millis) = setting(accessor, "rest.response_timeout", |raw| {
            parse_number("rest.response_timeout", raw)
        })? {
            rest.response_timeout = Duration::from_millis(millis);
        }
        if let Some(message_type) =
            setting(accessor, "rest.message_type", str::parse::<MessageType>)?
        {
            rest.message_type = message_type;
        }
        Ok(rest)
    }
}

/// Read and parse one key; a rejected value names where it came from
fn setting<T>(
    accessor: &dyn ConfigAccessor,
    key: &str,
    parse: impl FnOnce(&str) -> Result<T, ConfigError>,
) -> Result<Option<T>, ConfigError> {
    match accessor.get(key) {
        None => Ok(None),
        Some(raw) => parse(&raw)
            .map(Some)
            .map_err(|e| e.with_origin(accessor.source(key))),
    }
}

fn parse_number(field: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid_value(field, raw, "non-negative integer"))
}

fn parse_flag(accessor: &dyn ConfigAccessor, key: &str, default: bool) -> Result<bool, ConfigError> {
    let flag = setting(accessor, key, |raw| match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_value(key, raw, "true or false")),
    })?;
    Ok(flag.unwrap_or(default))
}
