//! Worker 注册表
//!
//! 按名称查找或创建 worker 的持久化身份，并提供配置读写。

use chrono::Utc;
use serde_json::{json, Value};
use silvermoon_domain::entities::{
    AnalysisResult, AnalysisTask, DataChannel, JsonMap, Record, Worker, WorkerKind,
};
use silvermoon_domain::events::BusMessage;
use silvermoon_domain::messaging::EventBus;
use silvermoon_domain::repositories::Repositories;
use silvermoon_errors::{SilvermoonError, SilvermoonResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct WorkerRegistry {
    repos: Repositories,
}

impl WorkerRegistry {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// 幂等的查找或创建；每次启动都会刷新 `hostname` 与 `last_started_at`
    pub async fn register(&self, name: &str, kind: WorkerKind) -> SilvermoonResult<WorkerHandle> {
        let mut worker = match self.repos.workers.find_by_name(name).await? {
            Some(existing) => {
                debug!("Worker {} 已注册: {}", name, existing.uuid);
                existing
            }
            None => self.create(name, kind).await?,
        };

        if worker.kind != kind {
            return Err(SilvermoonError::WorkerCapabilityMismatch {
                name: name.to_string(),
                expected: kind.to_string(),
                actual: worker.kind.to_string(),
            });
        }

        worker
            .metadata
            .insert("hostname".to_string(), json!(Self::hostname()));
        worker.metadata.insert(
            "last_started_at".to_string(),
            json!(Utc::now().to_rfc3339()),
        );
        self.repos.workers.update(&worker).await?;

        info!("Worker {} ({}) registered as {}", name, kind, worker.uuid);
        Ok(WorkerHandle {
            worker,
            repos: self.repos.clone(),
        })
    }

    pub async fn register_collector(
        &self,
        name: &str,
        bus: Arc<dyn EventBus>,
    ) -> SilvermoonResult<CollectorWorker> {
        let handle = self.register(name, WorkerKind::Collector).await?;
        Ok(CollectorWorker { handle, bus })
    }

    pub async fn register_analyser(
        &self,
        name: &str,
        bus: Arc<dyn EventBus>,
    ) -> SilvermoonResult<AnalyserWorker> {
        let handle = self.register(name, WorkerKind::Analyser).await?;
        Ok(AnalyserWorker { handle, bus })
    }

    async fn create(&self, name: &str, kind: WorkerKind) -> SilvermoonResult<Worker> {
        let worker = Worker::new(name, kind);
        match self.repos.workers.create(&worker).await {
            Ok(created) => Ok(created),
            // 另一个同名进程可能刚刚完成创建
            Err(e) => match self.repos.workers.find_by_name(name).await? {
                Some(existing) => {
                    warn!("创建Worker {} 冲突，使用已存在的记录: {}", name, e);
                    Ok(existing)
                }
                None => Err(e),
            },
        }
    }

    fn hostname() -> String {
        hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

/// 已注册 worker 的句柄，写配置时会回写存储
pub struct WorkerHandle {
    worker: Worker,
    repos: Repositories,
}

impl WorkerHandle {
    pub fn uuid(&self) -> uuid::Uuid {
        self.worker.uuid
    }

    pub fn name(&self) -> &str {
        &self.worker.name
    }

    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    pub fn get_config(&self, key: &str) -> Option<&Value> {
        self.worker.get_config(key)
    }

    pub async fn set_config(&mut self, key: &str, value: Value) -> SilvermoonResult<()> {
        self.worker.set_config(key, value);
        self.repos.workers.update(&self.worker).await
    }

    /// 首次写入生效，已存在的值不会被覆盖
    pub async fn register_config(&mut self, key: &str, default_value: Value) -> SilvermoonResult<bool> {
        if !self.worker.register_config(key, default_value) {
            return Ok(false);
        }
        self.repos.workers.update(&self.worker).await?;
        debug!("Worker {} 注册配置项 {}", self.worker.name, key);
        Ok(true)
    }

    /// 读取必需的配置项，缺失、null 或空字符串都视为未配置
    pub fn require_config(&self, key: &str) -> SilvermoonResult<String> {
        let missing = || SilvermoonError::missing_config(&self.worker.name, key);
        match self.worker.get_config(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
            Some(Value::String(_)) | Some(Value::Null) | None => Err(missing()),
            Some(other) => Ok(other.to_string()),
        }
    }
}

/// 采集器能力：通道与记录
pub struct CollectorWorker {
    handle: WorkerHandle,
    bus: Arc<dyn EventBus>,
}

impl CollectorWorker {
    pub fn handle(&self) -> &WorkerHandle {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut WorkerHandle {
        &mut self.handle
    }

    pub fn uuid(&self) -> uuid::Uuid {
        self.handle.uuid()
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// 同一采集器下按 uid 幂等
    pub async fn add_channel(
        &self,
        name: &str,
        uid: &str,
        description: Option<String>,
        metadata: Option<JsonMap>,
    ) -> SilvermoonResult<DataChannel> {
        if let Some(existing) = self.get_channel(uid).await? {
            return Ok(existing);
        }

        let mut channel = DataChannel::new(self.uuid(), uid, name);
        channel.description = description;
        channel.metadata = metadata.unwrap_or_default();
        let channel = self.handle.repos.channels.create(&channel).await?;
        info!("采集器 {} 新建数据通道 {} ({})", self.name(), uid, channel.uuid);
        Ok(channel)
    }

    pub async fn get_channel(&self, uid: &str) -> SilvermoonResult<Option<DataChannel>> {
        self.handle
            .repos
            .channels
            .find_by_collector_uid(self.uuid(), uid)
            .await
    }

    /// 保存记录并发布 NEW_DATA；通道不存在时以 uid 为名创建
    pub async fn add_data(
        &self,
        channel_uid: &str,
        payload: JsonMap,
        friendly_text: Option<String>,
    ) -> SilvermoonResult<Record> {
        let channel = match self.get_channel(channel_uid).await? {
            Some(channel) => channel,
            None => {
                self.add_channel(channel_uid, channel_uid, None, None)
                    .await?
            }
        };

        let record = Record::new(channel.uuid, payload, friendly_text);
        let record = self.handle.repos.records.create(&record).await?;
        self.bus
            .publish(&BusMessage::new_data(self.uuid(), record.uuid))
            .await?;

        debug!("采集器 {} 保存记录 {}", self.name(), record.uuid);
        Ok(record)
    }
}

/// 分析器能力：参数声明、任务读取与结果保存
pub struct AnalyserWorker {
    handle: WorkerHandle,
    bus: Arc<dyn EventBus>,
}

impl AnalyserWorker {
    pub fn handle(&self) -> &WorkerHandle {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut WorkerHandle {
        &mut self.handle
    }

    pub fn uuid(&self) -> uuid::Uuid {
        self.handle.uuid()
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn bus(&self) -> &Arc<dyn EventBus> {
        &self.bus
    }

    pub fn repositories(&self) -> &Repositories {
        &self.handle.repos
    }

    /// 声明任务触发器需要提供的参数，已存在的说明不会被覆盖
    pub async fn register_parameter(&mut self, key: &str, description: &str) -> SilvermoonResult<bool> {
        if !self.handle.worker.register_parameter(key, json!(description)) {
            return Ok(false);
        }
        self.handle.repos.workers.update(&self.handle.worker).await?;
        Ok(true)
    }

    /// 本分析器的全部任务，无法解码的任务以单独的错误项返回
    pub async fn tasks(&self) -> SilvermoonResult<Vec<SilvermoonResult<AnalysisTask>>> {
        self.handle.repos.tasks.find_by_analyser(self.uuid()).await
    }

    /// 保存结果并发布 NEW_ANALYSIS_RESULT
    pub async fn save_result(&self, result: &AnalysisResult) -> SilvermoonResult<()> {
        self.handle.repos.results.create(result).await?;
        self.bus
            .publish(&BusMessage::new_analysis_result(self.uuid(), result.uuid))
            .await?;
        info!("保存分析结果: '{}' ({})", result.name, result.uuid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silvermoon_domain::events::EventName;
    use silvermoon_errors::ErrorKind;
    use silvermoon_testing_utils::{json_map, MockEventBus, MockStore};

    #[tokio::test]
    async fn test_register_twice_yields_same_uuid() {
        let store = MockStore::new();
        let registry = WorkerRegistry::new(store.repositories());

        let first = registry.register("X", WorkerKind::Analyser).await.unwrap();
        let second = registry.register("X", WorkerKind::Analyser).await.unwrap();

        assert_eq!(first.uuid(), second.uuid());
        assert_eq!(store.workers.count(), 1);
        assert!(second.worker().metadata.contains_key("hostname"));
        assert!(second.worker().metadata.contains_key("last_started_at"));
    }

    #[tokio::test]
    async fn test_register_with_other_capability_fails() {
        let store = MockStore::new();
        let registry = WorkerRegistry::new(store.repositories());
        registry.register("X", WorkerKind::Collector).await.unwrap();

        let err = registry
            .register("X", WorkerKind::Analyser)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SilvermoonError::WorkerCapabilityMismatch { .. }));
        assert_eq!(err.kind(), ErrorKind::Data);
    }

    #[tokio::test]
    async fn test_register_config_first_write_wins_and_persists() {
        let store = MockStore::new();
        let registry = WorkerRegistry::new(store.repositories());
        let mut handle = registry.register("X", WorkerKind::Analyser).await.unwrap();

        assert!(handle.register_config("k", json!("d1")).await.unwrap());
        assert!(!handle.register_config("k", json!("d2")).await.unwrap());
        assert_eq!(handle.get_config("k"), Some(&json!("d1")));

        // 重新注册后从存储读回
        let reloaded = registry.register("X", WorkerKind::Analyser).await.unwrap();
        assert_eq!(reloaded.get_config("k"), Some(&json!("d1")));

        handle.set_config("k", json!("d3")).await.unwrap();
        let reloaded = registry.register("X", WorkerKind::Analyser).await.unwrap();
        assert_eq!(reloaded.get_config("k"), Some(&json!("d3")));
    }

    #[tokio::test]
    async fn test_require_config() {
        let store = MockStore::new();
        let registry = WorkerRegistry::new(store.repositories());
        let mut handle = registry.register("GPTAnalyser", WorkerKind::Analyser).await.unwrap();

        let err = handle.require_config("api_key").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        handle.register_config("api_key", json!("")).await.unwrap();
        assert!(handle.require_config("api_key").is_err());

        handle.set_config("api_key", Value::Null).await.unwrap();
        assert!(handle.require_config("api_key").is_err());

        handle.set_config("api_key", json!("sk-test")).await.unwrap();
        assert_eq!(handle.require_config("api_key").unwrap(), "sk-test");
    }

    #[tokio::test]
    async fn test_register_parameter_does_not_overwrite() {
        let store = MockStore::new();
        let registry = WorkerRegistry::new(store.repositories());
        let bus = Arc::new(MockEventBus::new());
        let mut analyser = registry.register_analyser("GPTAnalyser", bus).await.unwrap();

        assert!(analyser.register_parameter("prompt", "first").await.unwrap());
        assert!(!analyser.register_parameter("prompt", "second").await.unwrap());
        assert_eq!(
            analyser.handle().worker().task_parameters.get("prompt"),
            Some(&json!("first"))
        );
    }

    #[tokio::test]
    async fn test_add_data_creates_channel_once_and_raises_new_data() {
        let store = MockStore::new();
        let registry = WorkerRegistry::new(store.repositories());
        let bus = Arc::new(MockEventBus::new());
        let collector = registry
            .register_collector("Telegram", bus.clone())
            .await
            .unwrap();

        let first = collector
            .add_data("-1001", json_map(json!({"text": "a"})), Some("a".to_string()))
            .await
            .unwrap();
        let second = collector
            .add_data("-1001", json_map(json!({"text": "b"})), None)
            .await
            .unwrap();

        assert_eq!(store.channels.count(), 1);
        assert_eq!(first.channel_uuid, second.channel_uuid);
        let channel = collector.get_channel("-1001").await.unwrap().unwrap();
        assert_eq!(channel.name, "-1001");

        let published = bus.published_of(EventName::NewData);
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].source_worker_uuid, collector.uuid());
        assert_eq!(published[0].subject_uuid, first.uuid);
    }

    #[tokio::test]
    async fn test_add_channel_is_idempotent_per_collector() {
        let store = MockStore::new();
        let registry = WorkerRegistry::new(store.repositories());
        let bus: Arc<dyn EventBus> = Arc::new(MockEventBus::new());
        let telegram = registry
            .register_collector("Telegram", bus.clone())
            .await
            .unwrap();
        let rss = registry.register_collector("Rss", bus).await.unwrap();

        let a = telegram
            .add_channel("News", "news", Some("desc".to_string()), None)
            .await
            .unwrap();
        let b = telegram.add_channel("Renamed", "news", None, None).await.unwrap();
        let c = rss.add_channel("News", "news", None, None).await.unwrap();

        assert_eq!(a.uuid, b.uuid);
        assert_eq!(b.name, "News");
        assert_ne!(a.uuid, c.uuid);
        assert!(rss.get_channel("missing").await.unwrap().is_none());
    }
}
