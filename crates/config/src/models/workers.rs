use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// 触发器主题过滤策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TopicFilterMode {
    /// 忽略触发器上的主题，只按事件名和来源匹配
    #[default]
    Ignore,
    /// 触发器声明了主题时，要求主体所在通道至少带有其中一个
    Enforce,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyserConfig {
    pub topic_filter: TopicFilterMode,
    /// 默认结果标题为 `"{title_prefix} - {task.name}"`
    pub title_prefix: String,
    /// 订阅断开后重新订阅前的等待时间
    pub resubscribe_delay_seconds: u64,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            topic_filter: TopicFilterMode::Ignore,
            title_prefix: "GPT Analysis".to_string(),
            resubscribe_delay_seconds: 10,
        }
    }
}

impl ConfigValidator for AnalyserConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.title_prefix, "analyser.title_prefix")?;
        ValidationUtils::validate_timeout_seconds(
            self.resubscribe_delay_seconds,
            "analyser.resubscribe_delay_seconds",
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub reconnect_delay_seconds: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_seconds: 10,
        }
    }
}

impl ConfigValidator for CollectorConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_timeout_seconds(
            self.reconnect_delay_seconds,
            "collector.reconnect_delay_seconds",
        )
    }
}
