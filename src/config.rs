use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

/// Configuration errors (§6.4).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("validation error: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Server configuration with validation (§6.4).
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct ServerConfig {
    #[validate(length(min = 1, message = "host cannot be empty"))]
    pub host: String,

    #[validate(range(min = 1, max = 65535, message = "port must be between 1 and 65535"))]
    pub port: u16,

    /// Path to a graph definition file, or `None` for the bundled demo graph.
    pub graph: Option<String>,

    #[validate(range(min = 1, message = "max_message_size must be positive"))]
    pub max_message_size: usize,

    #[validate(range(min = 1, message = "idle_timeout_secs must be positive"))]
    pub idle_timeout_secs: u64,

    pub daemon: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7687,
            graph: None,
            max_message_size: 65536,
            idle_timeout_secs: 300,
            daemon: false,
        }
    }
}

impl ServerConfig {
    /// Build configuration from environment variables with validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            host: env::var("BOLTGRAPH_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_env_var("BOLTGRAPH_PORT", "7687")?,
            graph: env::var("BOLTGRAPH_GRAPH").ok(),
            max_message_size: parse_env_var("BOLTGRAPH_MAX_MESSAGE_SIZE", "65536")?,
            idle_timeout_secs: parse_env_var("BOLTGRAPH_IDLE_TIMEOUT_SECS", "300")?,
            daemon: false,
        };

        config.validate()?;
        Ok(config)
    }

    /// Build configuration from parsed CLI arguments.
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let config = Self {
            host: cli.host,
            port: cli.port,
            graph: cli.graph,
            max_message_size: cli.max_message_size,
            idle_timeout_secs: cli.idle_timeout_secs,
            daemon: cli.daemon,
        };

        config.validate()?;
        Ok(config)
    }

    /// Build configuration from a YAML file.
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
}

/// CLI configuration, parsed from command-line arguments (§6.4).
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub host: String,
    pub port: u16,
    pub graph: Option<String>,
    pub max_message_size: usize,
    pub idle_timeout_secs: u64,
    pub daemon: bool,
}

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
