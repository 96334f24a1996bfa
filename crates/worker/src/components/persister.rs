use chrono::Utc;
use serde_json::{json, Value};
use silvermoon_domain::entities::{AnalysisResult, AnalysisTask, JsonMap};
use silvermoon_domain::reasoning::ReasoningResponse;
use silvermoon_errors::SilvermoonResult;
use tracing::info;
use uuid::Uuid;

use super::interpreter::ResultState;
use super::subject::Subject;
use crate::reasoning::TOOLSET_VERSION;
use crate::registry::AnalyserWorker;

/// 一次 (任务, 触发器) 流水线运行的上下文
#[derive(Debug, Clone, Copy)]
pub struct PipelineContext<'a> {
    pub task: &'a AnalysisTask,
    pub trigger_index: usize,
    pub subject: &'a Subject,
    pub rendered_prompt: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    Saved(Uuid),
    Discarded { reason: Option<String> },
}

pub struct ResultPersister;

impl ResultPersister {
    pub fn build_result(
        analyser_uuid: Uuid,
        ctx: &PipelineContext<'_>,
        state: &ResultState,
        response: &ReasoningResponse,
    ) -> AnalysisResult {
        let mut payload = JsonMap::new();
        payload.insert(
            "result".to_string(),
            state.response.clone().map(Value::String).unwrap_or(Value::Null),
        );

        let mut metadata = JsonMap::new();
        metadata.insert("prompt_tokens".to_string(), json!(response.usage.prompt_tokens));
        metadata.insert(
            "completion_tokens".to_string(),
            json!(response.usage.completion_tokens),
        );
        metadata.insert("total_tokens".to_string(), json!(response.usage.total_tokens));
        metadata.insert("model".to_string(), json!(response.model));
        metadata.insert("request_id".to_string(), json!(response.request_id));
        metadata.insert("toolset_version".to_string(), json!(TOOLSET_VERSION));
        metadata.insert("trigger_index".to_string(), json!(ctx.trigger_index));
        metadata.insert("rendered_prompt".to_string(), json!(ctx.rendered_prompt));

        let mut display = JsonMap::new();
        display.insert("result".to_string(), json!("markdown"));

        AnalysisResult {
            uuid: Uuid::new_v4(),
            name: state.title.clone(),
            analyser_uuid,
            task_uuid: ctx.task.uuid,
            origin_record_uuid: ctx.subject.origin_record_uuid(),
            origin_result_uuid: ctx.subject.origin_result_uuid(),
            payload,
            metadata,
            display,
            importance: state.importance,
            hidden: false,
            created_at: Utc::now(),
        }
    }

    /// `save == false` 时既不写结果也不发布事件
    pub async fn persist(
        analyser: &AnalyserWorker,
        ctx: &PipelineContext<'_>,
        state: &ResultState,
        response: &ReasoningResponse,
    ) -> SilvermoonResult<PersistOutcome> {
        if !state.save {
            info!(
                "任务 {} 的结果未保存: {}",
                ctx.task.name,
                state.discard_reason.as_deref().unwrap_or("")
            );
            return Ok(PersistOutcome::Discarded {
                reason: state.discard_reason.clone(),
            });
        }

        let result = Self::build_result(analyser.uuid(), ctx, state, response);
        analyser.save_result(&result).await?;
        Ok(PersistOutcome::Saved(result.uuid))
    }
}
