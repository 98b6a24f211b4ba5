//! Error types for the ORM system
//!
//! Configuration problems surface when metadata is resolved, argument
//! problems when a caller hands the session something it cannot use, and
//! state problems when the session is driven out of order. Storage errors
//! come straight from the executor and are never retried here.

use thiserror::Error;

use tessera_core::ConfigError;

/// Result type alias for ORM operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for ORM operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Entity metadata is inconsistent (multiple keys, bad key type, ...)
    #[error("Model configuration error: {0}")]
    ModelConfiguration(String),

    /// A caller-supplied argument cannot be used
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The session was used before `open()` or after `close()`
    #[error("Session is not open")]
    SessionNotOpen,

    /// A mutation was attempted with autocommit disabled and no open transaction
    #[error("Transaction required: {0}")]
    TransactionRequired(String),

    /// Transaction state error
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Operation not supported by this session variant
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Malformed SQL reached the executor
    #[error("SQL grammar error: {message} in `{sql}`")]
    Grammar { sql: String, message: String },

    /// Storage engine failure
    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A unique result was requested but several rows matched
    #[error("Expected a unique result but {0} rows matched")]
    NonUniqueResult(usize),

    /// A value could not be converted to or from its column representation
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Mapping document could not be parsed
    #[error("Mapping document error: {0}")]
    MappingDocument(#[from] serde_yaml::Error),

    /// REST transport or response error
    #[error("REST error: {0}")]
    Rest(String),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl OrmError {
    pub fn model_configuration(message: impl Into<String>) -> Self {
        Self::ModelConfiguration(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Whether the error is a configuration-time failure
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::ModelConfiguration(_) | Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(OrmError::SessionNotOpen.to_string(), "Session is not open");
        assert_eq!(
            OrmError::NonUniqueResult(3).to_string(),
            "Expected a unique result but 3 rows matched"
        );
        let grammar = OrmError::Grammar {
            sql: "SELEC 1".into(),
            message: "near \"SELEC\": syntax error".into(),
        };
        assert!(grammar.to_string().contains("SELEC 1"));
    }

    #[test]
    fn test_config_errors_are_configuration() {
        let err: OrmError = ConfigError::missing_required("sqlite.db_name", "").into();
        assert!(err.is_configuration());
        assert!(OrmError::model_configuration("two keys").is_configuration());
        assert!(!OrmError::invalid_argument("bad").is_configuration());
    }
}
