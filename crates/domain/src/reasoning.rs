//! 推理服务端口
//!
//! 描述一次带工具声明的推理请求及其返回，具体传输由 worker 层实现。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use silvermoon_errors::SilvermoonResult;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// 声明给推理服务的工具：名称、调用条件说明与严格的参数 JSON Schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
}

/// 推理服务返回的一次工具调用，参数保持原始 JSON 文本
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: String,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: &serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReasoningResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolInvocation>,
    pub usage: TokenUsage,
    pub model: String,
    pub request_id: Option<String>,
}

/// 推理服务客户端
///
/// 传输或服务端错误一律返回 `ExternalService`，调用方不重试。
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn complete(&self, request: &ReasoningRequest) -> SilvermoonResult<ReasoningResponse>;
}
