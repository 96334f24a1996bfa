use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventBusType {
    #[default]
    Redis,
    InMemory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub database: i32,
    pub password: Option<String>,
    pub connection_timeout_seconds: u64,
    pub max_retry_attempts: u32,
    pub retry_delay_seconds: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            database: 0,
            password: None,
            connection_timeout_seconds: 30,
            max_retry_attempts: 3,
            retry_delay_seconds: 5,
        }
    }
}

impl RedisConfig {
    /// 构建 `redis://` 连接地址
    pub fn build_url(&self) -> String {
        match &self.password {
            Some(password) if !password.is_empty() => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.database
            ),
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

impl ConfigValidator for RedisConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.host, "event_bus.redis.host")?;
        ValidationUtils::validate_port(self.port)?;
        ValidationUtils::validate_timeout_seconds(
            self.connection_timeout_seconds,
            "event_bus.redis.connection_timeout_seconds",
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.retry_delay_seconds,
            "event_bus.redis.retry_delay_seconds",
        )?;

        if self.max_retry_attempts == 0 {
            return Err(crate::ConfigError::Validation(
                "event_bus.redis.max_retry_attempts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfig {
    pub bus_type: EventBusType,
    pub redis: RedisConfig,
    /// 进程内广播通道容量
    pub capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            bus_type: EventBusType::Redis,
            redis: RedisConfig::default(),
            capacity: 1024,
        }
    }
}

impl ConfigValidator for EventBusConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.bus_type == EventBusType::Redis {
            self.redis.validate()?;
        }
        ValidationUtils::validate_count(self.capacity, "event_bus.capacity")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_url() {
        let mut config = RedisConfig::default();
        assert_eq!(config.build_url(), "redis://127.0.0.1:6379/0");

        config.password = Some("secret".to_string());
        config.database = 2;
        assert_eq!(config.build_url(), "redis://:secret@127.0.0.1:6379/2");

        config.password = Some(String::new());
        assert_eq!(config.build_url(), "redis://127.0.0.1:6379/2");
    }

    #[test]
    fn test_in_memory_bus_skips_redis_validation() {
        let mut config = EventBusConfig::default();
        config.redis.host = String::new();
        assert!(config.validate().is_err());

        config.bus_type = EventBusType::InMemory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bus_type_names() {
        let parsed: EventBusType = serde_json::from_str("\"in_memory\"").unwrap();
        assert_eq!(parsed, EventBusType::InMemory);
        assert_eq!(
            serde_json::to_string(&EventBusType::Redis).unwrap(),
            "\"redis\""
        );
    }
}
