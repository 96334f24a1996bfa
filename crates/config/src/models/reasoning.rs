use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// 推理服务连接参数；API 密钥与模型属于各个分析器自己的 worker 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    pub base_url: String,
    /// 传输层超时，也是推理调用唯一的超时
    pub timeout_seconds: u64,
    /// 新注册的分析器 `model` 配置项的默认值
    pub default_model: String,
    pub system_prompt_enabled: bool,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_seconds: 120,
            default_model: "gpt-4o-mini".to_string(),
            system_prompt_enabled: true,
        }
    }
}

impl ConfigValidator for ReasoningConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_url(&self.base_url, "reasoning.base_url")?;
        ValidationUtils::validate_timeout_seconds(self.timeout_seconds, "reasoning.timeout_seconds")?;
        ValidationUtils::validate_not_empty(&self.default_model, "reasoning.default_model")?;
        Ok(())
    }
}
