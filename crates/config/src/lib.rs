pub mod models;
pub mod validation;


pub use models::{
    AnalyserConfig, AppConfig, CollectorConfig, DatabaseConfig, EventBusConfig, EventBusType,
    LogFormat, ObservabilityConfig, ReasoningConfig, RedisConfig, TopicFilterMode, ENV_PREFIX,
};
pub use validation::{ConfigValidator, ValidationUtils};

/// Configuration error type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration error enumeration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File error: {0}")]
    File(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
