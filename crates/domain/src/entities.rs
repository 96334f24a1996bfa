use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use silvermoon_errors::{ErrorKind, SilvermoonError};
use uuid::Uuid;

use crate::events::EventName;

/// 字符串键的 JSON 字典，用于配置、元数据与载荷
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Worker 能力标签
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    #[serde(rename = "COLLECTOR")]
    Collector,
    #[serde(rename = "ANALYSER")]
    Analyser,
}

impl WorkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::Collector => "COLLECTOR",
            WorkerKind::Analyser => "ANALYSER",
        }
    }
}

impl std::fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkerKind {
    type Err = SilvermoonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COLLECTOR" => Ok(WorkerKind::Collector),
            "ANALYSER" => Ok(WorkerKind::Analyser),
            _ => Err(SilvermoonError::Serialization(format!(
                "Invalid worker kind: {s}"
            ))),
        }
    }
}

/// 采集器或分析器的持久化身份
///
/// 名称全局唯一；同一名称的进程重启后复用同一条记录（同一个 UUID）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Worker {
    pub uuid: Uuid,
    pub name: String,
    pub kind: WorkerKind,
    pub description: Option<String>,
    pub config: JsonMap,
    pub metadata: JsonMap,
    /// 仅分析器使用：任务触发器需要提供的参数及其说明
    pub task_parameters: JsonMap,
    pub created_at: DateTime<Utc>,
}

impl Worker {
    pub fn new(name: impl Into<String>, kind: WorkerKind) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            kind,
            description: None,
            config: JsonMap::new(),
            metadata: JsonMap::new(),
            task_parameters: JsonMap::new(),
            created_at: Utc::now(),
        }
    }
    pub fn get_config(&self, key: &str) -> Option<&serde_json::Value> {
        self.config.get(key)
    }
    pub fn set_config(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.config.insert(key.into(), value);
    }
    /// 仅当配置项不存在时写入，返回是否发生了写入
    pub fn register_config(&mut self, key: &str, default_value: serde_json::Value) -> bool {
        if self.config.contains_key(key) {
            return false;
        }
        self.config.insert(key.to_string(), default_value);
        true
    }
    /// 仅当参数说明不存在时写入，返回是否发生了写入
    pub fn register_parameter(&mut self, key: &str, description: serde_json::Value) -> bool {
        if self.task_parameters.contains_key(key) {
            return false;
        }
        self.task_parameters.insert(key.to_string(), description);
        true
    }
    pub fn is_collector(&self) -> bool {
        matches!(self.kind, WorkerKind::Collector)
    }
    pub fn is_analyser(&self) -> bool {
        matches!(self.kind, WorkerKind::Analyser)
    }
}

/// 主题标签，例如 `financial-news`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    pub uuid: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            description: None,
        }
    }
}

/// 采集器下的一个逻辑数据源（例如一个订阅频道）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataChannel {
    pub uuid: Uuid,
    /// 采集器范围内的外部标识
    pub uid: String,
    pub name: String,
    pub description: Option<String>,
    pub collector_uuid: Uuid,
    pub topics: Vec<Uuid>,
    pub metadata: JsonMap,
    pub created_at: DateTime<Utc>,
}

impl DataChannel {
    pub fn new(collector_uuid: Uuid, uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            uid: uid.into(),
            name: name.into(),
            description: None,
            collector_uuid,
            topics: Vec::new(),
            metadata: JsonMap::new(),
            created_at: Utc::now(),
        }
    }
}

/// 原始采集数据，创建后不可变
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub uuid: Uuid,
    pub channel_uuid: Uuid,
    pub payload: JsonMap,
    pub metadata: JsonMap,
    pub friendly_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record {
    pub fn new(channel_uuid: Uuid, payload: JsonMap, friendly_text: Option<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            channel_uuid,
            payload,
            metadata: JsonMap::new(),
            friendly_text,
            created_at: Utc::now(),
        }
    }
}

/// 嵌入在任务中的触发条件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisTaskTrigger {
    pub events: Vec<EventName>,
    /// 只接受来自该 worker 的事件
    pub worker_uuid: Uuid,
    #[serde(default)]
    pub topics: Vec<Uuid>,
    #[serde(default)]
    pub parameters: JsonMap,
}

impl AnalysisTaskTrigger {
    pub fn new(events: Vec<EventName>, worker_uuid: Uuid) -> Self {
        Self {
            events,
            worker_uuid,
            topics: Vec::new(),
            parameters: JsonMap::new(),
        }
    }
    pub fn with_parameter(mut self, key: &str, value: serde_json::Value) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }
    pub fn with_topics(mut self, topics: Vec<Uuid>) -> Self {
        self.topics = topics;
        self
    }
    pub fn accepts(&self, event_name: EventName, source_worker_uuid: Uuid) -> bool {
        self.events.contains(&event_name) && self.worker_uuid == source_worker_uuid
    }
}

/// 分析任务：分析器与一组触发器的绑定，由界面维护
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisTask {
    pub uuid: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub analyser_uuid: Uuid,
    pub topics: Vec<Uuid>,
    /// 任务级参数，触发器参数缺省时回退到这里
    pub parameters: JsonMap,
    pub triggers: Vec<AnalysisTaskTrigger>,
}

impl AnalysisTask {
    pub fn new(name: impl Into<String>, analyser_uuid: Uuid) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            description: None,
            analyser_uuid,
            topics: Vec::new(),
            parameters: JsonMap::new(),
            triggers: Vec::new(),
        }
    }
    pub fn with_trigger(mut self, trigger: AnalysisTaskTrigger) -> Self {
        self.triggers.push(trigger);
        self
    }
    /// 先查触发器参数，再查任务参数
    pub fn parameter<'a>(
        &'a self,
        trigger: &'a AnalysisTaskTrigger,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        trigger
            .parameters
            .get(key)
            .or_else(|| self.parameters.get(key))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    #[default]
    Normal,
    High,
}

impl Importance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::Normal => "normal",
            Importance::High => "high",
        }
    }
}

impl std::str::FromStr for Importance {
    type Err = SilvermoonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Importance::Normal),
            "high" => Ok(Importance::High),
            _ => Err(SilvermoonError::Serialization(format!(
                "Invalid importance: {s}"
            ))),
        }
    }
}

/// 一次分析流水线的产出，创建后不可变
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub uuid: Uuid,
    pub name: String,
    pub analyser_uuid: Uuid,
    pub task_uuid: Uuid,
    pub origin_record_uuid: Uuid,
    pub origin_result_uuid: Option<Uuid>,
    pub payload: JsonMap,
    pub metadata: JsonMap,
    pub display: JsonMap,
    pub importance: Importance,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
}

/// worker 运行期间的一次失败，仅由错误上报器创建
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerError {
    pub uuid: Uuid,
    pub worker_name: String,
    pub error_type: ErrorKind,
    pub error_summary: String,
    pub traceback: Option<String>,
    pub metadata: JsonMap,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl WorkerError {
    pub fn new(
        worker_name: impl Into<String>,
        error_type: ErrorKind,
        error_summary: impl Into<String>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            worker_name: worker_name.into(),
            error_type,
            error_summary: error_summary.into(),
            traceback: None,
            metadata: JsonMap::new(),
            read: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_config_is_first_write_wins() {
        let mut worker = Worker::new("GPTAnalyser", WorkerKind::Analyser);
        assert!(worker.register_config("k", json!("d1")));
        assert!(!worker.register_config("k", json!("d2")));
        assert_eq!(worker.get_config("k"), Some(&json!("d1")));

        worker.set_config("k", json!("d3"));
        assert_eq!(worker.get_config("k"), Some(&json!("d3")));
    }

    #[test]
    fn test_trigger_accepts_event_name_and_source() {
        let source = Uuid::new_v4();
        let trigger = AnalysisTaskTrigger::new(vec![EventName::NewData], source);

        assert!(trigger.accepts(EventName::NewData, source));
        assert!(!trigger.accepts(EventName::NewAnalysisResult, source));
        assert!(!trigger.accepts(EventName::NewData, Uuid::new_v4()));
    }

    #[test]
    fn test_trigger_parameter_falls_back_to_task() {
        let mut task = AnalysisTask::new("translate", Uuid::new_v4());
        task.parameters.insert("model".to_string(), json!("gpt-4o"));
        let trigger = AnalysisTaskTrigger::new(vec![EventName::NewData], Uuid::new_v4())
            .with_parameter("prompt", json!("Translate {{ payload.text }}"));

        assert_eq!(task.parameter(&trigger, "model"), Some(&json!("gpt-4o")));
        assert_eq!(
            task.parameter(&trigger, "prompt"),
            Some(&json!("Translate {{ payload.text }}"))
        );
        assert_eq!(task.parameter(&trigger, "missing"), None);
    }

    #[test]
    fn test_trigger_deserializes_without_optional_fields() {
        let worker = Uuid::new_v4();
        let trigger: AnalysisTaskTrigger = serde_json::from_value(json!({
            "events": ["NEW_DATA"],
            "worker_uuid": worker,
        }))
        .unwrap();

        assert_eq!(trigger.events, vec![EventName::NewData]);
        assert!(trigger.topics.is_empty());
        assert!(trigger.parameters.is_empty());
    }

    #[test]
    fn test_importance_serialization() {
        assert_eq!(serde_json::to_value(Importance::High).unwrap(), json!("high"));
        assert_eq!("normal".parse::<Importance>().unwrap(), Importance::Normal);
        assert!("urgent".parse::<Importance>().is_err());
    }
}
