use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://silvermoon.db?mode=rwc".to_string(),
            max_connections: 5,
            connection_timeout_seconds: 30,
        }
    }
}

impl ConfigValidator for DatabaseConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.url, "database.url")?;

        if !self.url.starts_with("sqlite:") {
            return Err(crate::ConfigError::Validation(
                "database.url must start with sqlite:".to_string(),
            ));
        }

        ValidationUtils::validate_count(self.max_connections as usize, "database.max_connections")?;
        ValidationUtils::validate_timeout_seconds(
            self.connection_timeout_seconds,
            "database.connection_timeout_seconds",
        )?;

        Ok(())
    }
}
