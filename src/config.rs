use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Compiler limits and defaults with validation
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
#[validate(schema(function = "validate_limits"))]
#[serde(default)]
pub struct CompilerConfig {
    /// Rows returned by a list query without `limit`
    #[validate(range(
        min = 1,
        max = 1_000_000,
        message = "Default limit must be between 1 and 1000000"
    ))]
    pub default_limit: usize,

    /// Larger limits are clamped to this
    #[validate(range(min = 1, message = "Max limit must be positive"))]
    pub max_limit: usize,

    /// Parts kept by a default (data-driven) edge domain
    #[validate(range(
        min = 1,
        max = 100_000,
        message = "Default domain limit must be between 1 and 100000"
    ))]
    pub default_domain_limit: usize,

    /// Range, time and duration domains with more parts are rejected
    #[validate(range(
        min = 1,
        max = 10_000_000,
        message = "Max range partitions must be between 1 and 10000000"
    ))]
    pub max_range_partitions: usize,

    /// Whether edges emit a null bucket unless they say otherwise
    pub allow_nulls: bool,

    /// Array nesting deeper than this is rejected at insert
    #[validate(range(
        min = 1,
        max = 64,
        message = "Max nesting depth must be between 1 and 64"
    ))]
    pub max_nesting_depth: usize,

    /// Name of the synthetic digit CTE used to number range partitions
    #[validate(length(min = 1, message = "Digits table name cannot be empty"))]
    pub digits_table: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100_000,
            default_domain_limit: 100,
            max_range_partitions: 10_000,
            allow_nulls: false,
            max_nesting_depth: 8,
            digits_table: "__digits__".to_string(),
        }
    }
}

fn validate_limits(config: &CompilerConfig) -> Result<(), ValidationError> {
    if config.default_limit > config.max_limit {
        let mut error = ValidationError::new("default_limit_above_max");
        error.message = Some("Default limit cannot exceed max limit".into());
        return Err(error);
    }
    Ok(())
}

impl CompilerConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            default_limit: parse_env_var("JXSQL_DEFAULT_LIMIT", &defaults.default_limit.to_string())?,
            max_limit: parse_env_var("JXSQL_MAX_LIMIT", &defaults.max_limit.to_string())?,
            default_domain_limit: parse_env_var(
                "JXSQL_DEFAULT_DOMAIN_LIMIT",
                &defaults.default_domain_limit.to_string(),
            )?,
            max_range_partitions: parse_env_var(
                "JXSQL_MAX_RANGE_PARTITIONS",
                &defaults.max_range_partitions.to_string(),
            )?,
            allow_nulls: parse_env_var("JXSQL_ALLOW_NULLS", "false")?,
            max_nesting_depth: parse_env_var(
                "JXSQL_MAX_NESTING_DEPTH",
                &defaults.max_nesting_depth.to_string(),
            )?,
            digits_table: defaults.digits_table,
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

    /// Limit to apply to a list query
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        match requested {
            None => self.default_limit,
            Some(limit) if limit > self.max_limit => {
                log::warn!(
                    "Requested limit {} exceeds the maximum, using {}",
                    limit,
                    self.max_limit
                );
                self.max_limit
            }
            Some(limit) => limit,
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_limit, 10);
        assert_eq!(config.max_nesting_depth, 8);
        assert!(!config.allow_nulls);
    }

    #[test]
    fn test_default_limit_above_max() {
        let config = CompilerConfig {
            default_limit: 500,
            max_limit: 100,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_nesting_depth() {
        let config = CompilerConfig {
            max_nesting_depth: 0, // Invalid
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_limit() {
        let config = CompilerConfig {
            max_limit: 50,
            ..Default::default()
        };
        assert_eq!(config.effective_limit(None), 10);
        assert_eq!(config.effective_limit(Some(20)), 20);
        assert_eq!(config.effective_limit(Some(5_000)), 50);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var("JXSQL_DEFAULT_LIMIT", "25");
        env::set_var("JXSQL_ALLOW_NULLS", "true");
        let config = CompilerConfig::from_env();
        env::remove_var("JXSQL_DEFAULT_LIMIT");
        env::remove_var("JXSQL_ALLOW_NULLS");
        let config = config.unwrap();
        assert_eq!(config.default_limit, 25);
        assert!(config.allow_nulls);

        env::set_var("JXSQL_MAX_LIMIT", "lots");
        let bad = CompilerConfig::from_env();
        env::remove_var("JXSQL_MAX_LIMIT");
        assert!(matches!(bad, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_limit: 3\nallow_nulls: true").unwrap();
        let config = CompilerConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.default_limit, 3);
        assert!(config.allow_nulls);
        assert_eq!(config.max_limit, 100_000);
    }
}
