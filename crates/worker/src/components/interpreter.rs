//! 工具调用解释器
//!
//! 把推理服务返回的工具调用依次折叠成结果状态。参数先按声明的 JSON Schema 校验，
//! 再反序列化为强类型的 [`ToolCall`]；校验失败或未知的工具只会被拒绝，不影响其余调用。

use std::collections::HashMap;

use jsonschema::Validator;
use serde::Deserialize;
use serde_json::Value;
use silvermoon_domain::entities::Importance;
use silvermoon_domain::reasoning::ToolInvocation;
use silvermoon_errors::{SilvermoonError, SilvermoonResult};
use tracing::{debug, info, warn};

use crate::reasoning::tools::{self, TOOL_NAMES};

/// 已校验的工具调用
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    SetResponse { response: String },
    SetTitle { title: String },
    DiscardResult { reason: String },
    SetImportance { importance: Importance },
    DebugReasoning { reasoning: String },
}

#[derive(Deserialize)]
struct ResponseArgs {
    response: String,
}

#[derive(Deserialize)]
struct TitleArgs {
    title: String,
}

#[derive(Deserialize)]
struct DiscardArgs {
    reason: String,
}

#[derive(Deserialize)]
struct ImportanceArgs {
    importance: Importance,
}

#[derive(Deserialize)]
struct ReasoningArgs {
    reasoning: String,
}

/// 一次流水线运行中逐步累积的结果状态
#[derive(Debug, Clone, PartialEq)]
pub struct ResultState {
    pub title: String,
    pub importance: Importance,
    pub save: bool,
    pub response: Option<String>,
    pub discard_reason: Option<String>,
}

impl ResultState {
    pub fn new(default_title: impl Into<String>) -> Self {
        Self {
            title: default_title.into(),
            importance: Importance::Normal,
            save: true,
            response: None,
            discard_reason: None,
        }
    }

    /// 同一字段后写覆盖先写；一旦丢弃就不能再恢复保存
    pub fn apply(&mut self, call: ToolCall) {
        match call {
            ToolCall::SetResponse { response } => self.response = Some(response),
            ToolCall::SetTitle { title } => self.title = title,
            ToolCall::SetImportance { importance } => self.importance = importance,
            ToolCall::DiscardResult { reason } => {
                info!("结果被标记为丢弃: {}", reason);
                self.save = false;
                self.discard_reason = Some(reason);
            }
            ToolCall::DebugReasoning { reasoning } => {
                debug!("推理说明: {}", reasoning);
            }
        }
    }
}

/// 被拒绝的工具调用及原因
#[derive(Debug)]
pub struct RejectedInvocation {
    pub invocation: ToolInvocation,
    pub error: SilvermoonError,
}

#[derive(Debug)]
pub struct Interpretation {
    pub state: ResultState,
    pub rejected: Vec<RejectedInvocation>,
}

pub struct FunctionCallInterpreter {
    validators: HashMap<&'static str, Validator>,
}

impl FunctionCallInterpreter {
    pub fn new() -> SilvermoonResult<Self> {
        let mut validators = HashMap::with_capacity(TOOL_NAMES.len());
        for name in TOOL_NAMES {
            let schema = tools::schema_for(name)
                .ok_or_else(|| SilvermoonError::config_error(format!("工具 {name} 没有参数定义")))?;
            let validator = jsonschema::validator_for(&schema).map_err(|e| {
                SilvermoonError::config_error(format!("工具 {name} 的参数定义无效: {e}"))
            })?;
            validators.insert(name, validator);
        }
        Ok(Self { validators })
    }

    /// 按返回顺序应用每个工具调用
    pub fn interpret(&self, default_title: &str, invocations: &[ToolInvocation]) -> Interpretation {
        let mut state = ResultState::new(default_title);
        let mut rejected = Vec::new();

        for invocation in invocations {
            match self.decode(invocation) {
                Ok(call) => state.apply(call),
                Err(error) => {
                    warn!("拒绝工具调用 {}: {}", invocation.name, error);
                    rejected.push(RejectedInvocation {
                        invocation: invocation.clone(),
                        error,
                    });
                }
            }
        }

        Interpretation { state, rejected }
    }

    pub fn decode(&self, invocation: &ToolInvocation) -> SilvermoonResult<ToolCall> {
        let name = invocation.name.as_str();
        let validator = self
            .validators
            .get(name)
            .ok_or_else(|| SilvermoonError::invalid_tool(name, "未知的工具"))?;

        let arguments: Value = serde_json::from_str(&invocation.arguments)
            .map_err(|e| SilvermoonError::invalid_tool(name, format!("参数不是合法的JSON: {e}")))?;

        let violations: Vec<String> = validator
            .iter_errors(&arguments)
            .map(|e| e.to_string())
            .collect();
        if !violations.is_empty() {
            return Err(SilvermoonError::invalid_tool(name, violations.join("; ")));
        }

        let call = match name {
            tools::SET_RESPONSE => {
                let args: ResponseArgs = Self::arguments(name, arguments)?;
                ToolCall::SetResponse { response: args.response }
            }
            tools::SET_TITLE => {
                let args: TitleArgs = Self::arguments(name, arguments)?;
                ToolCall::SetTitle { title: args.title }
            }
            tools::DISCARD_RESULT => {
                let args: DiscardArgs = Self::arguments(name, arguments)?;
                ToolCall::DiscardResult { reason: args.reason }
            }
            tools::SET_IMPORTANCE => {
                let args: ImportanceArgs = Self::arguments(name, arguments)?;
                ToolCall::SetImportance { importance: args.importance }
            }
            tools::DEBUG_REASONING => {
                let args: ReasoningArgs = Self::arguments(name, arguments)?;
                ToolCall::DebugReasoning { reasoning: args.reasoning }
            }
            _ => return Err(SilvermoonError::invalid_tool(name, "未知的工具")),
        };
        Ok(call)
    }

    fn arguments<T: for<'de> Deserialize<'de>>(name: &str, value: Value) -> SilvermoonResult<T> {
        serde_json::from_value(value).map_err(|e| SilvermoonError::invalid_tool(name, e.to_string()))
    }
}
