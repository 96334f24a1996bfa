//! 仓储、事件总线与推理客户端的内存替身

use async_trait::async_trait;
use silvermoon_domain::entities::{
    AnalysisResult, AnalysisTask, DataChannel, Record, Topic, Worker, WorkerError,
};
use silvermoon_domain::events::{BusMessage, EventName};
use silvermoon_domain::messaging::{EventBus, EventSubscription};
use silvermoon_domain::reasoning::{ReasoningClient, ReasoningRequest, ReasoningResponse};
use silvermoon_domain::repositories::{
    ChannelRepository, RecordRepository, Repositories, ResultRepository, TaskRepository,
    TopicRepository, WorkerErrorRepository, WorkerRepository,
};
use silvermoon_errors::{SilvermoonError, SilvermoonResult};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Mock implementation of WorkerRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockWorkerRepository {
    workers: Arc<Mutex<HashMap<Uuid, Worker>>>,
}

impl MockWorkerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.workers.lock().unwrap().len()
    }
}

#[async_trait]
impl WorkerRepository for MockWorkerRepository {
    async fn create(&self, worker: &Worker) -> SilvermoonResult<Worker> {
        let mut workers = self.workers.lock().unwrap();
        if workers.values().any(|w| w.name == worker.name) {
            return Err(SilvermoonError::Persistence(format!(
                "UNIQUE constraint failed: workers.name ({})",
                worker.name
            )));
        }
        workers.insert(worker.uuid, worker.clone());
        Ok(worker.clone())
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> SilvermoonResult<Option<Worker>> {
        Ok(self.workers.lock().unwrap().get(&uuid).cloned())
    }

    async fn find_by_name(&self, name: &str) -> SilvermoonResult<Option<Worker>> {
        let workers = self.workers.lock().unwrap();
        Ok(workers.values().find(|w| w.name == name).cloned())
    }

    async fn update(&self, worker: &Worker) -> SilvermoonResult<()> {
        let mut workers = self.workers.lock().unwrap();
        match workers.get_mut(&worker.uuid) {
            Some(existing) => {
                *existing = worker.clone();
                Ok(())
            }
            None => Err(SilvermoonError::worker_not_found(worker.uuid.to_string())),
        }
    }
}

/// Mock implementation of TopicRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockTopicRepository {
    topics: Arc<Mutex<Vec<Topic>>>,
}

#[async_trait]
impl TopicRepository for MockTopicRepository {
    async fn create(&self, topic: &Topic) -> SilvermoonResult<Topic> {
        self.topics.lock().unwrap().push(topic.clone());
        Ok(topic.clone())
    }

    async fn find_by_name(&self, name: &str) -> SilvermoonResult<Option<Topic>> {
        let topics = self.topics.lock().unwrap();
        Ok(topics.iter().find(|t| t.name == name).cloned())
    }
}

/// Mock implementation of ChannelRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockChannelRepository {
    channels: Arc<Mutex<Vec<DataChannel>>>,
}

impl MockChannelRepository {
    pub fn count(&self) -> usize {
        self.channels.lock().unwrap().len()
    }
}

#[async_trait]
impl ChannelRepository for MockChannelRepository {
    async fn create(&self, channel: &DataChannel) -> SilvermoonResult<DataChannel> {
        let mut channels = self.channels.lock().unwrap();
        if channels
            .iter()
            .any(|c| c.collector_uuid == channel.collector_uuid && c.uid == channel.uid)
        {
            return Err(SilvermoonError::Persistence(format!(
                "UNIQUE constraint failed: data_channels ({})",
                channel.uid
            )));
        }
        channels.push(channel.clone());
        Ok(channel.clone())
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> SilvermoonResult<Option<DataChannel>> {
        let channels = self.channels.lock().unwrap();
        Ok(channels.iter().find(|c| c.uuid == uuid).cloned())
    }

    async fn find_by_collector_uid(
        &self,
        collector_uuid: Uuid,
        uid: &str,
    ) -> SilvermoonResult<Option<DataChannel>> {
        let channels = self.channels.lock().unwrap();
        Ok(channels
            .iter()
            .find(|c| c.collector_uuid == collector_uuid && c.uid == uid)
            .cloned())
    }
}

/// Mock implementation of RecordRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockRecordRepository {
    records: Arc<Mutex<HashMap<Uuid, Record>>>,
}

impl MockRecordRepository {
    pub fn all(&self) -> Vec<Record> {
        self.records.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl RecordRepository for MockRecordRepository {
    async fn create(&self, record: &Record) -> SilvermoonResult<Record> {
        self.records
            .lock()
            .unwrap()
            .insert(record.uuid, record.clone());
        Ok(record.clone())
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> SilvermoonResult<Option<Record>> {
        Ok(self.records.lock().unwrap().get(&uuid).cloned())
    }
}

/// Mock implementation of TaskRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockTaskRepository {
    tasks: Arc<Mutex<Vec<AnalysisTask>>>,
    broken: Arc<Mutex<Vec<(Uuid, String)>>>,
}

impl MockTaskRepository {
    /// 模拟一行无法解码的任务，`find_by_analyser` 会在对应位置返回 `Serialization` 错误
    pub fn insert_broken(&self, analyser_uuid: Uuid, message: &str) {
        self.broken
            .lock()
            .unwrap()
            .push((analyser_uuid, message.to_string()));
    }
}

#[async_trait]
impl TaskRepository for MockTaskRepository {
    async fn create(&self, task: &AnalysisTask) -> SilvermoonResult<AnalysisTask> {
        self.tasks.lock().unwrap().push(task.clone());
        Ok(task.clone())
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> SilvermoonResult<Option<AnalysisTask>> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks.iter().find(|t| t.uuid == uuid).cloned())
    }

    async fn find_by_analyser(
        &self,
        analyser_uuid: Uuid,
    ) -> SilvermoonResult<Vec<SilvermoonResult<AnalysisTask>>> {
        let broken = self.broken.lock().unwrap();
        let tasks = self.tasks.lock().unwrap();
        Ok(broken
            .iter()
            .filter(|(owner, _)| *owner == analyser_uuid)
            .map(|(_, message)| Err(SilvermoonError::Serialization(message.clone())))
            .chain(
                tasks
                    .iter()
                    .filter(|t| t.analyser_uuid == analyser_uuid)
                    .cloned()
                    .map(Ok),
            )
            .collect())
    }
}

/// Mock implementation of ResultRepository for testing
///
/// `set_should_fail(true)` 之后的写入返回 `Persistence` 错误。
#[derive(Debug, Clone, Default)]
pub struct MockResultRepository {
    results: Arc<Mutex<Vec<AnalysisResult>>>,
    should_fail: Arc<AtomicBool>,
}

impl MockResultRepository {
    pub fn all(&self) -> Vec<AnalysisResult> {
        self.results.lock().unwrap().clone()
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResultRepository for MockResultRepository {
    async fn create(&self, result: &AnalysisResult) -> SilvermoonResult<AnalysisResult> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(SilvermoonError::Persistence(
                "Mock result repository failure".to_string(),
            ));
        }
        self.results.lock().unwrap().push(result.clone());
        Ok(result.clone())
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> SilvermoonResult<Option<AnalysisResult>> {
        let results = self.results.lock().unwrap();
        Ok(results.iter().find(|r| r.uuid == uuid).cloned())
    }

    async fn find_by_task(&self, task_uuid: Uuid) -> SilvermoonResult<Vec<AnalysisResult>> {
        let results = self.results.lock().unwrap();
        Ok(results
            .iter()
            .rev()
            .filter(|r| r.task_uuid == task_uuid)
            .cloned()
            .collect())
    }
}

/// Mock implementation of WorkerErrorRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockWorkerErrorRepository {
    errors: Arc<Mutex<Vec<WorkerError>>>,
    should_fail: Arc<AtomicBool>,
}

impl MockWorkerErrorRepository {
    /// 按写入顺序返回
    pub fn all(&self) -> Vec<WorkerError> {
        self.errors.lock().unwrap().clone()
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl WorkerErrorRepository for MockWorkerErrorRepository {
    async fn create(&self, error: &WorkerError) -> SilvermoonResult<WorkerError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(SilvermoonError::Persistence(
                "Mock worker error repository failure".to_string(),
            ));
        }
        self.errors.lock().unwrap().push(error.clone());
        Ok(error.clone())
    }

    async fn list(&self) -> SilvermoonResult<Vec<WorkerError>> {
        let mut errors = self.errors.lock().unwrap().clone();
        errors.reverse();
        Ok(errors)
    }

    async fn count_unread(&self) -> SilvermoonResult<i64> {
        let errors = self.errors.lock().unwrap();
        Ok(errors.iter().filter(|e| !e.read).count() as i64)
    }

    async fn mark_read(&self, uuid: Uuid) -> SilvermoonResult<bool> {
        let mut errors = self.errors.lock().unwrap();
        match errors.iter_mut().find(|e| e.uuid == uuid) {
            Some(error) => {
                error.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// 内存仓储集合，保留各个 mock 的具体类型以便断言
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    pub workers: MockWorkerRepository,
    pub topics: MockTopicRepository,
    pub channels: MockChannelRepository,
    pub records: MockRecordRepository,
    pub tasks: MockTaskRepository,
    pub results: MockResultRepository,
    pub errors: MockWorkerErrorRepository,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repositories(&self) -> Repositories {
        Repositories {
            workers: Arc::new(self.workers.clone()),
            topics: Arc::new(self.topics.clone()),
            channels: Arc::new(self.channels.clone()),
            records: Arc::new(self.records.clone()),
            tasks: Arc::new(self.tasks.clone()),
            results: Arc::new(self.results.clone()),
            errors: Arc::new(self.errors.clone()),
        }
    }
}

pub fn in_memory_repositories() -> Repositories {
    MockStore::new().repositories()
}

/// 记录发布历史的内存事件总线
#[derive(Debug, Clone)]
pub struct MockEventBus {
    published: Arc<Mutex<Vec<BusMessage>>>,
    sender: broadcast::Sender<BusMessage>,
    should_fail: Arc<AtomicBool>,
}

impl Default for MockEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            sender,
            should_fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn published(&self) -> Vec<BusMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_of(&self, event_name: EventName) -> Vec<BusMessage> {
        self.published()
            .into_iter()
            .filter(|m| m.event_name == event_name)
            .collect()
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventBus for MockEventBus {
    async fn publish(&self, message: &BusMessage) -> SilvermoonResult<()> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(SilvermoonError::MessageBus(
                "Mock event bus failure".to_string(),
            ));
        }
        self.published.lock().unwrap().push(*message);
        let _ = self.sender.send(*message);
        Ok(())
    }

    async fn subscribe(&self, events: &[EventName]) -> SilvermoonResult<Box<dyn EventSubscription>> {
        Ok(Box::new(MockSubscription {
            receiver: self.sender.subscribe(),
            events: events.to_vec(),
        }))
    }
}

pub struct MockSubscription {
    receiver: broadcast::Receiver<BusMessage>,
    events: Vec<EventName>,
}

#[async_trait]
impl EventSubscription for MockSubscription {
    async fn next(&mut self) -> SilvermoonResult<Option<BusMessage>> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if self.events.contains(&message.event_name) => {
                    return Ok(Some(message))
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }
}

/// 按脚本依次返回的订阅，脚本耗尽后返回 `Ok(None)`
pub struct ScriptedSubscription {
    items: VecDeque<SilvermoonResult<BusMessage>>,
}

impl ScriptedSubscription {
    pub fn new(items: Vec<SilvermoonResult<BusMessage>>) -> Self {
        Self {
            items: items.into(),
        }
    }
}

#[async_trait]
impl EventSubscription for ScriptedSubscription {
    async fn next(&mut self) -> SilvermoonResult<Option<BusMessage>> {
        match self.items.pop_front() {
            Some(item) => item.map(Some),
            None => Ok(None),
        }
    }
}

/// 按脚本依次返回响应的推理客户端，并记录收到的请求
///
/// 脚本耗尽后返回不含工具调用的空响应。
#[derive(Debug, Clone, Default)]
pub struct MockReasoningClient {
    responses: Arc<Mutex<VecDeque<SilvermoonResult<ReasoningResponse>>>>,
    requests: Arc<Mutex<Vec<ReasoningRequest>>>,
}

impl MockReasoningClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<SilvermoonResult<ReasoningResponse>>) -> Self {
        let client = Self::new();
        for response in responses {
            client.push_response(response);
        }
        client
    }

    pub fn push_response(&self, response: SilvermoonResult<ReasoningResponse>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ReasoningClient for MockReasoningClient {
    async fn complete(&self, request: &ReasoningRequest) -> SilvermoonResult<ReasoningResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(ReasoningResponse {
                    model: request.model.clone(),
                    ..ReasoningResponse::default()
                })
            })
    }
}
