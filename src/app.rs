use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use silvermoon_config::AppConfig;
use silvermoon_domain::messaging::EventBus;
use silvermoon_infrastructure::{DatabaseManager, EventBusFactory};
use silvermoon_worker::{
    bootstrap_analyser, AnalyserService, AnalyserSettings, CollectorService, JsonLinesSource,
    OpenAiReasoningClient, WorkerRegistry,
};
use tokio::sync::broadcast;
use tracing::info;

/// 应用运行模式
#[derive(Debug, Clone, PartialEq)]
pub enum AppMode {
    /// 运行一个分析器
    Analyser { name: String },
    /// 运行一个采集器，`input` 为空时从标准输入读取
    Collector { name: String, input: Option<PathBuf> },
}

impl AppMode {
    pub fn worker_name(&self) -> &str {
        match self {
            AppMode::Analyser { name } | AppMode::Collector { name, .. } => name,
        }
    }
}

/// 主应用程序：持有存储与事件总线，按模式运行一个 worker
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    database: DatabaseManager,
    bus: Arc<dyn EventBus>,
}

impl Application {
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);

        let database = DatabaseManager::new(&config.database)
            .await
            .context("连接数据库失败")?;
        database.migrate().await.context("初始化数据库结构失败")?;

        let bus = EventBusFactory::create(&config.event_bus)
            .await
            .context("创建事件总线失败")?;

        Ok(Self {
            config,
            mode,
            database,
            bus,
        })
    }

    pub fn mode(&self) -> &AppMode {
        &self.mode
    }

    /// 运行直到收到关闭信号；采集器的数据源结束时也会返回
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let registry = WorkerRegistry::new(self.database.repositories());

        let result = match &self.mode {
            AppMode::Analyser { name } => self.run_analyser(&registry, name, shutdown_rx).await,
            AppMode::Collector { name, input } => {
                self.run_collector(&registry, name, input.clone(), shutdown_rx)
                    .await
            }
        };

        self.database.close().await;
        result
    }

    async fn run_analyser(
        &self,
        registry: &WorkerRegistry,
        name: &str,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let settings = AnalyserSettings::from_config(&self.config);
        let (analyser, api_key) = bootstrap_analyser(registry, self.bus.clone(), name, &settings)
            .await
            .with_context(|| format!("分析器 {name} 启动失败"))?;

        let client = OpenAiReasoningClient::new(&self.config.reasoning, api_key)?;
        let service = AnalyserService::new(analyser, Arc::new(client), settings)?;
        service.run(shutdown_rx).await?;

        info!("分析器 {} 已停止", name);
        Ok(())
    }

    async fn run_collector(
        &self,
        registry: &WorkerRegistry,
        name: &str,
        input: Option<PathBuf>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let collector = registry
            .register_collector(name, self.bus.clone())
            .await
            .with_context(|| format!("采集器 {name} 注册失败"))?;
        let service = CollectorService::new(
            collector,
            Duration::from_secs(self.config.collector.reconnect_delay_seconds),
        );

        match input {
            Some(path) => {
                service
                    .run(|| JsonLinesSource::open(path.clone()), shutdown_rx)
                    .await?
            }
            None => {
                service
                    .run(|| async { Ok(JsonLinesSource::stdin()) }, shutdown_rx)
                    .await?
            }
        }

        info!("采集器 {} 已停止", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silvermoon_config::{DatabaseConfig, EventBusConfig, EventBusType};
    use std::io::Write;

    fn in_memory_config() -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                ..DatabaseConfig::default()
            },
            event_bus: EventBusConfig {
                bus_type: EventBusType::InMemory,
                ..EventBusConfig::default()
            },
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_analyser_without_api_key_fails_startup() {
        let mode = AppMode::Analyser {
            name: "GPTAnalyser".to_string(),
        };
        let app = Application::new(in_memory_config(), mode).await.unwrap();
        let (_tx, rx) = broadcast::channel(1);

        let err = app.run(rx).await.unwrap_err();
        assert!(format!("{err:#}").contains("api_key"));
    }

    #[tokio::test]
    async fn test_collector_reads_input_file_to_end() {
        let mut input = tempfile::NamedTempFile::new().unwrap();
        writeln!(input, r#"{{"channel": "news", "payload": {{"text": "hello"}}}}"#).unwrap();

        let mode = AppMode::Collector {
            name: "Feed".to_string(),
            input: Some(input.path().to_path_buf()),
        };
        assert_eq!(mode.worker_name(), "Feed");
        let app = Application::new(in_memory_config(), mode).await.unwrap();
        let (_tx, rx) = broadcast::channel(1);

        app.run(rx).await.unwrap();
    }
}
