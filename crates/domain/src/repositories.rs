//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则。核心流程只依赖这些 trait，
//! 具体存储由基础设施层注入。

use std::sync::Arc;

use async_trait::async_trait;
use silvermoon_errors::SilvermoonResult;
use uuid::Uuid;

use crate::entities::{
    AnalysisResult, AnalysisTask, DataChannel, Record, Topic, Worker, WorkerError,
};

/// Worker仓储抽象
#[async_trait]
pub trait WorkerRepository: Send + Sync {
    async fn create(&self, worker: &Worker) -> SilvermoonResult<Worker>;
    async fn find_by_uuid(&self, uuid: Uuid) -> SilvermoonResult<Option<Worker>>;
    async fn find_by_name(&self, name: &str) -> SilvermoonResult<Option<Worker>>;
    /// 覆盖写入描述、配置、元数据与任务参数
    async fn update(&self, worker: &Worker) -> SilvermoonResult<()>;
}

/// 主题仓储抽象
#[async_trait]
pub trait TopicRepository: Send + Sync {
    async fn create(&self, topic: &Topic) -> SilvermoonResult<Topic>;
    async fn find_by_name(&self, name: &str) -> SilvermoonResult<Option<Topic>>;
}

/// 数据通道仓储抽象
#[async_trait]
pub trait ChannelRepository: Send + Sync {
    async fn create(&self, channel: &DataChannel) -> SilvermoonResult<DataChannel>;
    async fn find_by_uuid(&self, uuid: Uuid) -> SilvermoonResult<Option<DataChannel>>;
    async fn find_by_collector_uid(
        &self,
        collector_uuid: Uuid,
        uid: &str,
    ) -> SilvermoonResult<Option<DataChannel>>;
}

/// 采集记录仓储抽象
#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn create(&self, record: &Record) -> SilvermoonResult<Record>;
    async fn find_by_uuid(&self, uuid: Uuid) -> SilvermoonResult<Option<Record>>;
}

/// 分析任务仓储抽象（核心只读，写入由界面完成）
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &AnalysisTask) -> SilvermoonResult<AnalysisTask>;
    async fn find_by_uuid(&self, uuid: Uuid) -> SilvermoonResult<Option<AnalysisTask>>;
    /// 逐行解码：外层错误表示查询失败，内层错误只属于对应的那一个任务
    async fn find_by_analyser(
        &self,
        analyser_uuid: Uuid,
    ) -> SilvermoonResult<Vec<SilvermoonResult<AnalysisTask>>>;
}

/// 分析结果仓储抽象
#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn create(&self, result: &AnalysisResult) -> SilvermoonResult<AnalysisResult>;
    async fn find_by_uuid(&self, uuid: Uuid) -> SilvermoonResult<Option<AnalysisResult>>;
    async fn find_by_task(&self, task_uuid: Uuid) -> SilvermoonResult<Vec<AnalysisResult>>;
}

/// Worker错误记录仓储抽象
#[async_trait]
pub trait WorkerErrorRepository: Send + Sync {
    async fn create(&self, error: &WorkerError) -> SilvermoonResult<WorkerError>;
    /// 按时间倒序
    async fn list(&self) -> SilvermoonResult<Vec<WorkerError>>;
    async fn count_unread(&self) -> SilvermoonResult<i64>;
    async fn mark_read(&self, uuid: Uuid) -> SilvermoonResult<bool>;
}

/// 存储连接句柄，在构造时显式传入各个组件
#[derive(Clone)]
pub struct Repositories {
    pub workers: Arc<dyn WorkerRepository>,
    pub topics: Arc<dyn TopicRepository>,
    pub channels: Arc<dyn ChannelRepository>,
    pub records: Arc<dyn RecordRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub results: Arc<dyn ResultRepository>,
    pub errors: Arc<dyn WorkerErrorRepository>,
}
