use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

use crate::expression_validator::cache::DEFAULT_CACHE_SIZE;
use crate::query_ast::Dialect;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Builder configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Storage dialect used for quoting, comment syntax and function names
    pub dialect: Dialect,

    /// Restrict link values to the user's permitted documents only, instead
    /// of also admitting empty links
    pub apply_strict_user_permissions: bool,

    /// Entries kept by the select-field sanitize cache
    #[validate(range(
        min = 1,
        max = 1_000_000,
        message = "Validator cache size must be between 1 and 1000000"
    ))]
    pub validator_cache_size: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::MariaDb,
            apply_strict_user_permissions: false,
            validator_cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl BuilderConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let dialect_value =
            env::var("GUARDED_QUERY_DIALECT").unwrap_or_else(|_| "mariadb".to_string());
        let dialect = dialect_value
            .parse::<Dialect>()
            .map_err(|e| ConfigError::Parse {
                field: "GUARDED_QUERY_DIALECT".to_string(),
                value: dialect_value.clone(),
                source: e.into(),
            })?;

        let config = Self {
            dialect,
            apply_strict_user_permissions: parse_env_var(
                "GUARDED_QUERY_STRICT_USER_PERMISSIONS",
                "false",
            )?,
            validator_cache_size: parse_env_var(
                "GUARDED_QUERY_VALIDATOR_CACHE_SIZE",
                &DEFAULT_CACHE_SIZE.to_string(),
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_strict_user_permissions(mut self, strict: bool) -> Self {
        self.apply_strict_user_permissions = strict;
        self
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
