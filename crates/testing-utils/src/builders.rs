//! Test data builders for creating test entities

use serde_json::{json, Value};
use silvermoon_domain::entities::{
    AnalysisTask, AnalysisTaskTrigger, DataChannel, JsonMap, Record, Worker, WorkerKind,
};
use silvermoon_domain::events::EventName;
use silvermoon_domain::reasoning::{ReasoningResponse, TokenUsage, ToolInvocation};
use uuid::Uuid;

/// Builder for creating test AnalysisTask entities
pub struct TaskBuilder {
    task: AnalysisTask,
}

impl TaskBuilder {
    pub fn new(analyser_uuid: Uuid) -> Self {
        Self {
            task: AnalysisTask::new("test_task", analyser_uuid),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.task.name = name.to_string();
        self
    }

    pub fn with_parameter(mut self, key: &str, value: Value) -> Self {
        self.task.parameters.insert(key.to_string(), value);
        self
    }

    pub fn with_topics(mut self, topics: Vec<Uuid>) -> Self {
        self.task.topics = topics;
        self
    }

    /// 监听 `source` 的 NEW_DATA 事件，并带上 prompt 参数
    pub fn with_data_trigger(self, source: Uuid, prompt: &str) -> Self {
        self.with_trigger(
            AnalysisTaskTrigger::new(vec![EventName::NewData], source)
                .with_parameter("prompt", json!(prompt)),
        )
    }

    pub fn with_trigger(mut self, trigger: AnalysisTaskTrigger) -> Self {
        self.task.triggers.push(trigger);
        self
    }

    pub fn build(self) -> AnalysisTask {
        self.task
    }
}

/// Builder for creating scripted ReasoningResponse values
pub struct ResponseBuilder {
    response: ReasoningResponse,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self {
            response: ReasoningResponse {
                model: "gpt-4o-mini".to_string(),
                request_id: Some(format!("chatcmpl-{}", Uuid::new_v4().simple())),
                usage: TokenUsage {
                    prompt_tokens: 100,
                    completion_tokens: 20,
                    total_tokens: 120,
                },
                ..ReasoningResponse::default()
            },
        }
    }

    pub fn call(mut self, name: &str, arguments: Value) -> Self {
        self.response
            .tool_calls
            .push(ToolInvocation::new(name, &arguments));
        self
    }

    /// 参数不是合法 JSON 的调用
    pub fn raw_call(mut self, name: &str, arguments: &str) -> Self {
        self.response.tool_calls.push(ToolInvocation {
            name: name.to_string(),
            arguments: arguments.to_string(),
        });
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.response.text = Some(text.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.response.model = model.to_string();
        self
    }

    pub fn build(self) -> ReasoningResponse {
        self.response
    }
}

pub fn collector(name: &str) -> Worker {
    Worker::new(name, WorkerKind::Collector)
}

pub fn analyser(name: &str) -> Worker {
    Worker::new(name, WorkerKind::Analyser)
}

pub fn channel(collector_uuid: Uuid, uid: &str) -> DataChannel {
    DataChannel::new(collector_uuid, uid, uid)
}

pub fn record(channel_uuid: Uuid, payload: Value) -> Record {
    Record::new(channel_uuid, json_map(payload), None)
}

/// 把 JSON 对象转为 [`JsonMap`]，非对象返回空字典
pub fn json_map(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}
