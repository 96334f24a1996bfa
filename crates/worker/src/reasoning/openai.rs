use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use silvermoon_config::ReasoningConfig;
use silvermoon_domain::reasoning::{
    ChatMessage, ReasoningClient, ReasoningRequest, ReasoningResponse, TokenUsage,
    ToolInvocation,
};
use silvermoon_errors::{SilvermoonError, SilvermoonResult};
use tracing::{debug, error};

/// OpenAI 兼容的 chat completions 客户端
///
/// 每次请求都携带完整工具集并要求至少调用一个工具。
pub struct OpenAiReasoningClient {
    endpoint: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl OpenAiReasoningClient {
    pub fn new(config: &ReasoningConfig, api_key: impl Into<String>) -> SilvermoonResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SilvermoonError::config_error(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn request_body(request: &ReasoningRequest) -> WireRequest<'_> {
        WireRequest {
            model: &request.model,
            messages: &request.messages,
            tools: request
                .tools
                .iter()
                .map(|tool| WireTool {
                    kind: "function",
                    function: WireFunction {
                        name: &tool.name,
                        description: &tool.description,
                        parameters: &tool.parameters,
                        strict: true,
                    },
                })
                .collect(),
            tool_choice: "required",
        }
    }

    pub(crate) fn parse_response(body: &str) -> SilvermoonResult<ReasoningResponse> {
        let wire: WireResponse = serde_json::from_str(body)
            .map_err(|e| SilvermoonError::external_service(format!("无法解析推理服务响应: {e}")))?;

        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SilvermoonError::external_service("推理服务响应中没有候选结果"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| ToolInvocation {
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        Ok(ReasoningResponse {
            text: choice.message.content,
            tool_calls,
            usage: wire.usage.unwrap_or_default(),
            model: wire.model,
            request_id: wire.id,
        })
    }
}

#[async_trait]
impl ReasoningClient for OpenAiReasoningClient {
    async fn complete(&self, request: &ReasoningRequest) -> SilvermoonResult<ReasoningResponse> {
        let body = Self::request_body(request);
        debug!("调用推理服务 {} (model={})", self.endpoint, request.model);

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("推理服务连接失败: {}", e);
                SilvermoonError::external_service(format!("推理服务连接失败: {e}"))
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SilvermoonError::external_service(format!("读取推理服务响应失败: {e}")))?;

        if !status.is_success() {
            error!("推理服务返回错误: HTTP {} - {}", status, text);
            return Err(SilvermoonError::external_service(format!(
                "HTTP {status} - {text}"
            )));
        }

        Self::parse_response(&text)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    tools: Vec<WireTool<'a>>,
    tool_choice: &'static str,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    id: Option<String>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}
