//! 推理请求的组装与 OpenAI 兼容客户端

pub mod openai;
pub mod tools;

pub use openai::OpenAiReasoningClient;

use silvermoon_domain::reasoning::{ChatMessage, ReasoningRequest};

/// 工具集版本，写入结果元数据
pub const TOOLSET_VERSION: &str = "2";

pub const SYSTEM_PROMPT: &str = "In addition to the user's request, you will be provided with a list of functions that you can call if \
their criteria is met. The criteria for each function call is included in its 'description' field. \
You MUST obey the requirements specified in the 'description' field. Do NOT call the functions if \
these requirements are not met. DO call these functions if the requirements ARE met. \
Deliver your answer to the user's request through the set_response function.";

/// 组装一次推理请求：可选的系统指令、渲染后的提示词与完整工具集
pub fn build_request(model: &str, prompt: &str, include_system_prompt: bool) -> ReasoningRequest {
    let mut messages = Vec::with_capacity(2);
    if include_system_prompt {
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
    }
    messages.push(ChatMessage::user(prompt));

    ReasoningRequest {
        model: model.to_string(),
        messages,
        tools: tools::tool_definitions(),
    }
}
