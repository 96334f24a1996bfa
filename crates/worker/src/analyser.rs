//! 分析器服务
//!
//! 单一顺序消费者：逐条处理订阅到的事件，为每个匹配的 (任务, 触发器) 独立运行一次
//! 渲染 → 推理 → 解释 → 持久化 流水线。任何一次运行的失败都只会被上报，不会中断监听。

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use silvermoon_config::{AppConfig, TopicFilterMode};
use silvermoon_domain::entities::{AnalysisTask, AnalysisTaskTrigger, JsonMap};
use silvermoon_domain::events::{BusMessage, EventName};
use silvermoon_domain::messaging::{EventBus, EventSubscription};
use silvermoon_domain::reasoning::ReasoningClient;
use silvermoon_errors::{ErrorKind, SilvermoonError, SilvermoonResult};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::components::{
    ErrorReporter, FunctionCallInterpreter, MatchedTrigger, PersistOutcome, PipelineContext,
    PromptRenderer, ResultPersister, Subject, TriggerMatcher,
};
use crate::reasoning::build_request;
use crate::registry::{AnalyserWorker, WorkerRegistry};

pub const MODEL_KEY: &str = "model";
pub const API_KEY: &str = "api_key";

#[derive(Debug, Clone)]
pub struct AnalyserSettings {
    pub topic_filter: TopicFilterMode,
    pub title_prefix: String,
    pub default_model: String,
    pub system_prompt_enabled: bool,
    pub resubscribe_delay: Duration,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl AnalyserSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            topic_filter: config.analyser.topic_filter,
            title_prefix: config.analyser.title_prefix.clone(),
            default_model: config.reasoning.default_model.clone(),
            system_prompt_enabled: config.reasoning.system_prompt_enabled,
            resubscribe_delay: Duration::from_secs(config.analyser.resubscribe_delay_seconds),
        }
    }
}

/// 注册分析器身份、配置项与任务参数，并读取必需的 API 密钥
///
/// 缺少密钥时写入一条 WorkerError 并返回配置错误，调用方不应进入监听循环。
pub async fn bootstrap_analyser(
    registry: &WorkerRegistry,
    bus: Arc<dyn EventBus>,
    name: &str,
    settings: &AnalyserSettings,
) -> SilvermoonResult<(AnalyserWorker, String)> {
    let mut analyser = registry.register_analyser(name, bus).await?;
    let reporter = ErrorReporter::new(name, analyser.repositories().errors.clone());

    let handle = analyser.handle_mut();
    handle
        .register_config(MODEL_KEY, json!(settings.default_model))
        .await?;
    handle.register_config(API_KEY, json!("")).await?;

    analyser
        .register_parameter(
            "prompt",
            "提示词模板，可以用 {{ payload.<字段> }} 引用主体数据",
        )
        .await?;
    analyser
        .register_parameter(MODEL_KEY, "可选，覆盖分析器配置的模型")
        .await?;

    match analyser.handle().require_config(API_KEY) {
        Ok(api_key) => Ok((analyser, api_key)),
        Err(e) => {
            reporter.report(&e, None).await;
            Err(e)
        }
    }
}

/// 一次 (任务, 触发器) 运行的结局
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Saved {
        task_uuid: Uuid,
        trigger_index: usize,
        result_uuid: Uuid,
    },
    Discarded {
        task_uuid: Uuid,
        trigger_index: usize,
        reason: Option<String>,
    },
    Failed {
        task_uuid: Uuid,
        trigger_index: usize,
        kind: ErrorKind,
    },
}

/// 一次订阅的结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenEnd {
    Shutdown,
    /// 订阅流结束，通常是总线连接断开
    Disconnected,
}

pub struct AnalyserService {
    analyser: AnalyserWorker,
    client: Arc<dyn ReasoningClient>,
    settings: AnalyserSettings,
    matcher: TriggerMatcher,
    renderer: PromptRenderer,
    interpreter: FunctionCallInterpreter,
    reporter: ErrorReporter,
    broken_tasks: Mutex<HashSet<String>>,
}

impl AnalyserService {
    pub fn new(
        analyser: AnalyserWorker,
        client: Arc<dyn ReasoningClient>,
        settings: AnalyserSettings,
    ) -> SilvermoonResult<Self> {
        let reporter = ErrorReporter::new(analyser.name(), analyser.repositories().errors.clone());
        Ok(Self {
            matcher: TriggerMatcher::new(settings.topic_filter),
            renderer: PromptRenderer::new(),
            interpreter: FunctionCallInterpreter::new()?,
            analyser,
            client,
            settings,
            reporter,
            broken_tasks: Mutex::new(HashSet::new()),
        })
    }

    pub fn analyser(&self) -> &AnalyserWorker {
        &self.analyser
    }

    /// 订阅两类事件并开始监听，直到收到关闭信号
    pub async fn run(&self, shutdown: broadcast::Receiver<()>) -> SilvermoonResult<()> {
        let bus = self.analyser.bus().clone();
        self.run_resubscribing(
            move || {
                let bus = bus.clone();
                async move { bus.subscribe(&EventName::ALL).await }
            },
            shutdown,
        )
        .await
    }

    /// 用 `subscribe` 建立订阅并监听；订阅失败或断开时上报，
    /// 等待 `resubscribe_delay` 后重新订阅，只有关闭信号会让它返回
    pub async fn run_resubscribing<F, Fut>(
        &self,
        mut subscribe: F,
        mut shutdown: broadcast::Receiver<()>,
    ) -> SilvermoonResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SilvermoonResult<Box<dyn EventSubscription>>>,
    {
        loop {
            match subscribe().await {
                Ok(subscription) => {
                    if self.listen(subscription, &mut shutdown).await == ListenEnd::Shutdown {
                        return Ok(());
                    }
                    let e = SilvermoonError::MessageBus(format!(
                        "分析器 {} 的订阅已断开",
                        self.analyser.name()
                    ));
                    warn!("{}", e);
                    self.reporter.report(&e, None).await;
                }
                Err(e) => {
                    warn!("分析器 {} 订阅事件失败: {}", self.analyser.name(), e);
                    self.reporter.report(&e, None).await;
                }
            }

            info!("{:?} 后重新订阅", self.settings.resubscribe_delay);
            tokio::select! {
                _ = shutdown.recv() => return Ok(()),
                _ = tokio::time::sleep(self.settings.resubscribe_delay) => {}
            }
        }
    }

    /// 在一个已建立的订阅上监听，不重新订阅
    pub async fn run_with(
        &self,
        subscription: Box<dyn EventSubscription>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> ListenEnd {
        self.listen(subscription, &mut shutdown).await
    }

    async fn listen(
        &self,
        mut subscription: Box<dyn EventSubscription>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> ListenEnd {
        info!("分析器 {} 开始监听事件", self.analyser.name());

        loop {
            let next = tokio::select! {
                _ = shutdown.recv() => {
                    info!("分析器 {} 收到关闭信号", self.analyser.name());
                    return ListenEnd::Shutdown;
                }
                next = subscription.next() => next,
            };

            match next {
                Ok(Some(message)) => {
                    self.handle_message(&message).await;
                }
                Ok(None) => {
                    info!("分析器 {} 的订阅已关闭", self.analyser.name());
                    return ListenEnd::Disconnected;
                }
                Err(e) => {
                    warn!("接收总线消息失败: {}", e);
                    self.reporter.report(&e, None).await;
                }
            }
        }
    }

    /// 处理一条总线消息；所有失败都在这里被上报，返回每个匹配项的结局
    pub async fn handle_message(&self, message: &BusMessage) -> Vec<PipelineOutcome> {
        match self.process(message).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                let mut metadata = JsonMap::new();
                metadata.insert("event_name".to_string(), json!(message.event_name));
                metadata.insert(
                    "source_worker_uuid".to_string(),
                    json!(message.source_worker_uuid),
                );
                metadata.insert("subject_uuid".to_string(), json!(message.subject_uuid));
                self.reporter.report(&e, Some(metadata)).await;
                Vec::new()
            }
        }
    }

    async fn process(&self, message: &BusMessage) -> SilvermoonResult<Vec<PipelineOutcome>> {
        let tasks = self.load_tasks().await?;
        if !self.matcher.any_candidate(&tasks, message) {
            debug!(
                "没有任务接受来自 {} 的 {}",
                message.source_worker_uuid, message.event_name
            );
            return Ok(Vec::new());
        }

        let repos = self.analyser.repositories();
        repos
            .workers
            .find_by_uuid(message.source_worker_uuid)
            .await?
            .ok_or_else(|| SilvermoonError::worker_not_found(message.source_worker_uuid.to_string()))?;
        let subject = Subject::resolve(repos, message).await?;

        let topics = match self.matcher.topic_filter() {
            TopicFilterMode::Enforce => subject.channel_topics(repos).await?,
            TopicFilterMode::Ignore => Vec::new(),
        };

        let mut outcomes = Vec::new();
        for matched in self.matcher.matches(&tasks, message, &topics) {
            let outcome = match self.run_pipeline(&matched, &subject).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let mut metadata = JsonMap::new();
                    metadata.insert("task_uuid".to_string(), json!(matched.task.uuid));
                    metadata.insert("task_name".to_string(), json!(matched.task.name));
                    metadata.insert("trigger_index".to_string(), json!(matched.trigger_index));
                    metadata.insert("subject_uuid".to_string(), json!(subject.uuid()));
                    self.reporter.report(&e, Some(metadata)).await;
                    PipelineOutcome::Failed {
                        task_uuid: matched.task.uuid,
                        trigger_index: matched.trigger_index,
                        kind: e.kind(),
                    }
                }
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// 加载任务；无法解码的任务被跳过，同一个错误只上报一次
    async fn load_tasks(&self) -> SilvermoonResult<Vec<AnalysisTask>> {
        let mut tasks = Vec::new();
        for loaded in self.analyser.tasks().await? {
            match loaded {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    let first_seen = self.broken_tasks.lock().await.insert(e.to_string());
                    if first_seen {
                        warn!("跳过无法解析的分析任务: {}", e);
                        self.reporter.report(&e, None).await;
                    } else {
                        debug!("跳过无法解析的分析任务: {}", e);
                    }
                }
            }
        }
        Ok(tasks)
    }

    async fn run_pipeline(
        &self,
        matched: &MatchedTrigger<'_>,
        subject: &Subject,
    ) -> SilvermoonResult<PipelineOutcome> {
        let task = matched.task;
        let template = PromptRenderer::template(task, matched.trigger)?;
        let prompt = self.renderer.render(template, subject.payload())?;
        let model = self.model_for(task, matched.trigger);

        info!(
            "运行任务 {} (触发器 #{}, 主体 {}, 模型 {})",
            task.name,
            matched.trigger_index,
            subject.uuid(),
            model
        );
        let request = build_request(&model, &prompt, self.settings.system_prompt_enabled);
        let response = self.client.complete(&request).await?;
        if let Some(text) = &response.text {
            debug!("推理服务返回的文本: {}", text);
        }

        let default_title = format!("{} - {}", self.settings.title_prefix, task.name);
        let interpretation = self.interpreter.interpret(&default_title, &response.tool_calls);
        for rejected in &interpretation.rejected {
            let mut metadata = JsonMap::new();
            metadata.insert("task_uuid".to_string(), json!(task.uuid));
            metadata.insert("tool".to_string(), json!(rejected.invocation.name));
            metadata.insert("arguments".to_string(), json!(rejected.invocation.arguments));
            self.reporter.report(&rejected.error, Some(metadata)).await;
        }

        let ctx = PipelineContext {
            task,
            trigger_index: matched.trigger_index,
            subject,
            rendered_prompt: &prompt,
        };
        let outcome =
            ResultPersister::persist(&self.analyser, &ctx, &interpretation.state, &response)
                .await?;

        Ok(match outcome {
            PersistOutcome::Saved(result_uuid) => PipelineOutcome::Saved {
                task_uuid: task.uuid,
                trigger_index: matched.trigger_index,
                result_uuid,
            },
            PersistOutcome::Discarded { reason } => PipelineOutcome::Discarded {
                task_uuid: task.uuid,
                trigger_index: matched.trigger_index,
                reason,
            },
        })
    }

    /// 触发器/任务参数优先，其次是分析器配置，最后是全局默认
    fn model_for(&self, task: &AnalysisTask, trigger: &AnalysisTaskTrigger) -> String {
        let non_empty = |value: Option<&Value>| match value {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        };
        non_empty(task.parameter(trigger, MODEL_KEY))
            .or_else(|| non_empty(self.analyser.handle().get_config(MODEL_KEY)))
            .unwrap_or_else(|| self.settings.default_model.clone())
    }
}
