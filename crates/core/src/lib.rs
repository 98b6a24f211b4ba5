//! # tessera-core
//!
//! Foundation shared by the tessera crates: the key-value configuration
//! accessor, the typed ORM configuration resolved from it, configuration
//! errors, and logging bootstrap.

pub mod config;
pub mod logging;

pub use config::{
    ConfigAccessor, ConfigError, ConfigSource, ConfigurationMode, EnvAccessor, MapAccessor,
    MessageType, OrmConfig, RestConfig, SessionConfig, SqliteConfig,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get framework version
pub fn version() -> &'static str {
    VERSION
}
