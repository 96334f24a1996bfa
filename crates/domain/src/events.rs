//! 总线事件
//!
//! 总线上只传递标识符，订阅方需要按 `subject_uuid` 回到存储中解析主体。

use serde::{Deserialize, Serialize};
use silvermoon_errors::SilvermoonError;
use uuid::Uuid;

/// 事件类型，同时也是总线上的频道名
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventName {
    /// 采集器保存了新的记录，主体是 Record
    #[serde(rename = "NEW_DATA")]
    NewData,
    /// 分析器保存了新的结果，主体是 AnalysisResult
    #[serde(rename = "NEW_ANALYSIS_RESULT")]
    NewAnalysisResult,
}

impl EventName {
    pub const ALL: [EventName; 2] = [EventName::NewData, EventName::NewAnalysisResult];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::NewData => "NEW_DATA",
            EventName::NewAnalysisResult => "NEW_ANALYSIS_RESULT",
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventName {
    type Err = SilvermoonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW_DATA" => Ok(EventName::NewData),
            "NEW_ANALYSIS_RESULT" => Ok(EventName::NewAnalysisResult),
            _ => Err(SilvermoonError::Serialization(format!(
                "Unknown event name: {s}"
            ))),
        }
    }
}

/// 总线消息 `{event_name, source_worker_uuid, subject_uuid}`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusMessage {
    pub event_name: EventName,
    pub source_worker_uuid: Uuid,
    pub subject_uuid: Uuid,
}

impl BusMessage {
    pub fn new(event_name: EventName, source_worker_uuid: Uuid, subject_uuid: Uuid) -> Self {
        Self {
            event_name,
            source_worker_uuid,
            subject_uuid,
        }
    }
    pub fn new_data(source_worker_uuid: Uuid, record_uuid: Uuid) -> Self {
        Self::new(EventName::NewData, source_worker_uuid, record_uuid)
    }
    pub fn new_analysis_result(source_worker_uuid: Uuid, result_uuid: Uuid) -> Self {
        Self::new(EventName::NewAnalysisResult, source_worker_uuid, result_uuid)
    }
    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
    pub fn deserialize(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
