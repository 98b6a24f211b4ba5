use thiserror::Error;

use crate::config::ConfigSource;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}{}", origin_suffix(.origin))]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
        /// Where the rejected value was read from, when known
        origin: Option<ConfigSource>,
    },

    #[error("Parsing error: {message}")]
    ParsingError { message: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    /// Create a missing required field error
    pub fn missing_required(field: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::MissingRequired {
            field: field.into(),
            hint: hint.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
            origin: None,
        }
    }

    /// Attach the source of a rejected value; other errors pass through
    pub fn with_origin(self, source: ConfigSource) -> Self {
        match self {
            Self::InvalidValue {
                field,
                value,
                expected,
                origin: None,
            } => Self::InvalidValue {
                field,
                value,
                expected,
                origin: Some(source),
            },
            other => other,
        }
    }

    /// Create a parsing error
    pub fn parsing(message: impl Into<String>) -> Self {
        Self::ParsingError {
            message: message.into(),
        }
    }
}

fn origin_suffix(origin: &Option<ConfigSource>) -> String {
    match origin {
        Some(source) => format!(" (from {})", source),
        None => String::new(),
    }
}

/// Trait for validating configuration values
pub trait ConfigValidator<T> {
    /// Validate a configuration value
    fn validate(&self, value: &T) -> Result<(), ConfigError>;
}

/// URL validator for REST hosts
pub struct UrlValidator {
    pub schemes: Vec<String>,
    pub require_host: bool,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self {
            schemes: vec!["http".to_string(), "https".to_string()],
            require_host: true,
        }
    }
}

impl ConfigValidator<String> for UrlValidator {
    fn validate(&self, value: &String) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(value)
            .map_err(|e| ConfigError::invalid_value("rest.host", value.clone(), e.to_string()))?;

        if !self.schemes.iter().any(|scheme| scheme == parsed.scheme()) {
            return Err(ConfigError::invalid_value(
                "rest.host",
                value.clone(),
                format!("URL with scheme: {}", self.schemes.join(", ")),
            ));
        }

        if self.require_host && parsed.host_str().map_or(true, str::is_empty) {
            return Err(ConfigError::invalid_value(
                "rest.host",
                value.clone(),
                "URL with a host",
            ));
        }

        Ok(())
    }
}

/// Validates that a numeric setting falls within a range
pub struct RangeValidator {
    pub field: &'static str,
    pub min: u64,
    pub max: u64,
}

impl ConfigValidator<u64> for RangeValidator {
    fn validate(&self, value: &u64) -> Result<(), ConfigError> {
        if *value < self.min || *value > self.max {
            return Err(ConfigError::invalid_value(
                self.field,
                value.to_string(),
                format!("value between {} and {}", self.min, self.max),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validator_accepts_http_hosts() {
        let validator = UrlValidator::default();
        assert!(validator.validate(&"http://localhost:8080/api".to_string()).is_ok());
        assert!(validator.validate(&"https://example.com".to_string()).is_ok());
    }

    #[test]
    fn test_url_validator_rejects_other_schemes() {
        let validator = UrlValidator::default();
        let result = validator.validate(&"ftp://example.com".to_string());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        assert!(validator.validate(&"not a url".to_string()).is_err());
    }

    #[test]
    fn test_range_validator() {
        let validator = RangeValidator {
            field: "session.cache_size",
            min: 1,
            max: 10,
        };
        assert!(validator.validate(&5).is_ok());
        assert!(validator.validate(&0).is_err());
        assert!(validator.validate(&11).is_err());
    }

    #[test]
    fn test_origin_is_named_in_message() {
        let bare = ConfigError::invalid_value("sqlite.db_version", "0", "value between 1 and 9");
        assert!(!bare.to_string().contains("from"));

        let sourced = bare.with_origin(ConfigSource::EnvVar("TESSERA_SQLITE_DB_VERSION".into()));
        assert!(sourced
            .to_string()
            .ends_with("(from environment variable TESSERA_SQLITE_DB_VERSION)"));

        let missing = ConfigError::missing_required("rest.host", "")
            .with_origin(ConfigSource::Default);
        assert!(matches!(missing, ConfigError::MissingRequired { .. }));
    }
}
