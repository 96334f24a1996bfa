use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, ConfigBuilder as Builder, Environment, File, FileFormat};
use config::builder::DefaultState;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    database::DatabaseConfig,
    event_bus::EventBusConfig,
    observability::ObservabilityConfig,
    reasoning::ReasoningConfig,
    workers::{AnalyserConfig, CollectorConfig},
};
use crate::validation::ConfigValidator;

pub const ENV_PREFIX: &str = "SILVERMOON";

const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/silvermoon.toml",
    "silvermoon.toml",
    "/etc/silvermoon/config.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub event_bus: EventBusConfig,
    pub reasoning: ReasoningConfig,
    pub analyser: AnalyserConfig,
    pub collector: CollectorConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 按 默认值 → TOML 文件 → `SILVERMOON__*` 环境变量 的顺序加载并校验
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Self::defaults()?;

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        Self::finish(builder)
    }

    /// 从 TOML 文本加载，未出现的字段使用默认值
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let builder = Self::defaults()?.add_source(File::from_str(toml_str, FileFormat::Toml));
        Self::finish(builder)
    }

    fn finish(builder: Builder<DefaultState>) -> Result<Self> {
        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    fn defaults() -> Result<Builder<DefaultState>> {
        let builder = ConfigBuilder::builder()
            .set_default("database.url", "sqlite://silvermoon.db?mode=rwc")?
            .set_default("database.max_connections", 5)?
            .set_default("database.connection_timeout_seconds", 30)?
            .set_default("event_bus.bus_type", "redis")?
            .set_default("event_bus.capacity", 1024)?
            .set_default("event_bus.redis.host", "127.0.0.1")?
            .set_default("event_bus.redis.port", 6379)?
            .set_default("event_bus.redis.database", 0)?
            .set_default("event_bus.redis.connection_timeout_seconds", 30)?
            .set_default("event_bus.redis.max_retry_attempts", 3)?
            .set_default("event_bus.redis.retry_delay_seconds", 5)?
            .set_default("reasoning.base_url", "https://api.openai.com/v1")?
            .set_default("reasoning.timeout_seconds", 120)?
            .set_default("reasoning.default_model", "gpt-4o-mini")?
            .set_default("reasoning.system_prompt_enabled", true)?
            .set_default("analyser.topic_filter", "ignore")?
            .set_default("analyser.title_prefix", "GPT Analysis")?
            .set_default("analyser.resubscribe_delay_seconds", 10)?
            .set_default("collector.reconnect_delay_seconds", 10)?
            .set_default("observability.log_level", "info")?
            .set_default("observability.log_format", "pretty")?;
        Ok(builder)
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.database.validate()?;
        self.event_bus.validate()?;
        self.reasoning.validate()?;
        self.analyser.validate()?;
        self.collector.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}
