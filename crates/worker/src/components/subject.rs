use silvermoon_domain::entities::{AnalysisResult, JsonMap, Record};
use silvermoon_domain::events::{BusMessage, EventName};
use silvermoon_domain::repositories::Repositories;
use silvermoon_errors::{SilvermoonError, SilvermoonResult};
use uuid::Uuid;

/// 事件主体：NEW_DATA 指向记录，NEW_ANALYSIS_RESULT 指向先前的结果
#[derive(Debug, Clone)]
pub enum Subject {
    Record(Record),
    Result(AnalysisResult),
}

impl Subject {
    pub async fn resolve(repos: &Repositories, message: &BusMessage) -> SilvermoonResult<Self> {
        match message.event_name {
            EventName::NewData => repos
                .records
                .find_by_uuid(message.subject_uuid)
                .await?
                .map(Subject::Record)
                .ok_or_else(|| SilvermoonError::record_not_found(message.subject_uuid.to_string())),
            EventName::NewAnalysisResult => repos
                .results
                .find_by_uuid(message.subject_uuid)
                .await?
                .map(Subject::Result)
                .ok_or_else(|| SilvermoonError::result_not_found(message.subject_uuid.to_string())),
        }
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            Subject::Record(record) => record.uuid,
            Subject::Result(result) => result.uuid,
        }
    }

    /// 绑定到提示词模板中 `payload` 的数据
    pub fn payload(&self) -> &JsonMap {
        match self {
            Subject::Record(record) => &record.payload,
            Subject::Result(result) => &result.payload,
        }
    }

    pub fn origin_record_uuid(&self) -> Uuid {
        match self {
            Subject::Record(record) => record.uuid,
            Subject::Result(result) => result.origin_record_uuid,
        }
    }

    pub fn origin_result_uuid(&self) -> Option<Uuid> {
        match self {
            Subject::Record(_) => None,
            Subject::Result(result) => Some(result.uuid),
        }
    }

    /// 主体所在通道的主题；结果沿原始记录回溯到通道
    pub async fn channel_topics(&self, repos: &Repositories) -> SilvermoonResult<Vec<Uuid>> {
        let record_uuid = self.origin_record_uuid();
        let channel_uuid = match self {
            Subject::Record(record) => record.channel_uuid,
            Subject::Result(_) => {
                repos
                    .records
                    .find_by_uuid(record_uuid)
                    .await?
                    .ok_or_else(|| SilvermoonError::record_not_found(record_uuid.to_string()))?
                    .channel_uuid
            }
        };

        let channel = repos
            .channels
            .find_by_uuid(channel_uuid)
            .await?
            .ok_or_else(|| SilvermoonError::channel_not_found(channel_uuid.to_string()))?;
        Ok(channel.topics)
    }
}
