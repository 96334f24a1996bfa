use serde::{Deserialize, Serialize};
use thiserror::Error;


/// 错误分类
///
/// 每个 [`SilvermoonError`] 都归属于其中一类，WorkerError 记录中保存的就是这个分类名。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 启动时缺少必要配置，只会阻止 worker 启动
    #[serde(rename = "ConfigurationError")]
    Configuration,
    /// 触发器参数缺失、引用无法解析等，只中止一次流水线运行
    #[serde(rename = "DataError")]
    Data,
    /// 推理服务调用失败，不重试
    #[serde(rename = "ExternalServiceError")]
    ExternalService,
    /// 存储或事件总线写入失败
    #[serde(rename = "PersistenceError")]
    Persistence,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::Data => "DataError",
            ErrorKind::ExternalService => "ExternalServiceError",
            ErrorKind::Persistence => "PersistenceError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = SilvermoonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ConfigurationError" => Ok(ErrorKind::Configuration),
            "DataError" => Ok(ErrorKind::Data),
            "ExternalServiceError" => Ok(ErrorKind::ExternalService),
            "PersistenceError" => Ok(ErrorKind::Persistence),
            other => Err(SilvermoonError::Serialization(format!(
                "未知的错误分类: {other}"
            ))),
        }
    }
}

#[derive(Debug, Error)]
pub enum SilvermoonError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("持久化错误: {0}")]
    Persistence(String),
    #[error("事件总线错误: {0}")]
    MessageBus(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("Worker '{worker}' 缺少必要配置项: {key}")]
    MissingConfig { worker: String, key: String },
    #[error("Worker未找到: {id}")]
    WorkerNotFound { id: String },
    #[error("Worker '{name}' 已注册为 {actual}，无法作为 {expected} 使用")]
    WorkerCapabilityMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("数据通道未找到: {id}")]
    ChannelNotFound { id: String },
    #[error("采集记录未找到: {id}")]
    RecordNotFound { id: String },
    #[error("分析结果未找到: {id}")]
    ResultNotFound { id: String },
    #[error("触发器缺少模板参数: {parameter}")]
    MissingTemplateParameter { parameter: String },
    #[error("无效的模板参数 {parameter}: {message}")]
    InvalidTemplateParameter { parameter: String, message: String },
    #[error("无效的工具调用 {tool}: {message}")]
    InvalidToolInvocation { tool: String, message: String },
    #[error("外部服务错误: {0}")]
    ExternalService(String),
}

pub type SilvermoonResult<T> = Result<T, SilvermoonError>;

impl SilvermoonError {
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn missing_config<W: Into<String>, K: Into<String>>(worker: W, key: K) -> Self {
        Self::MissingConfig {
            worker: worker.into(),
            key: key.into(),
        }
    }
    pub fn worker_not_found<S: Into<String>>(id: S) -> Self {
        Self::WorkerNotFound { id: id.into() }
    }
    pub fn record_not_found<S: Into<String>>(id: S) -> Self {
        Self::RecordNotFound { id: id.into() }
    }
    pub fn result_not_found<S: Into<String>>(id: S) -> Self {
        Self::ResultNotFound { id: id.into() }
    }
    pub fn channel_not_found<S: Into<String>>(id: S) -> Self {
        Self::ChannelNotFound { id: id.into() }
    }
    pub fn external_service<S: Into<String>>(msg: S) -> Self {
        Self::ExternalService(msg.into())
    }
    pub fn invalid_tool<T: Into<String>, M: Into<String>>(tool: T, message: M) -> Self {
        Self::InvalidToolInvocation {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// 错误所属分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            SilvermoonError::Configuration(_) | SilvermoonError::MissingConfig { .. } => {
                ErrorKind::Configuration
            }
            SilvermoonError::Database(_)
            | SilvermoonError::Persistence(_)
            | SilvermoonError::MessageBus(_) => ErrorKind::Persistence,
            SilvermoonError::ExternalService(_) => ErrorKind::ExternalService,
            SilvermoonError::Serialization(_)
            | SilvermoonError::WorkerNotFound { .. }
            | SilvermoonError::WorkerCapabilityMismatch { .. }
            | SilvermoonError::ChannelNotFound { .. }
            | SilvermoonError::RecordNotFound { .. }
            | SilvermoonError::ResultNotFound { .. }
            | SilvermoonError::MissingTemplateParameter { .. }
            | SilvermoonError::InvalidTemplateParameter { .. }
            | SilvermoonError::InvalidToolInvocation { .. } => ErrorKind::Data,
        }
    }

    /// 只有配置错误允许阻止 worker 进入监听循环
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

impl From<serde_json::Error> for SilvermoonError {
    fn from(err: serde_json::Error) -> Self {
        SilvermoonError::Serialization(err.to_string())
    }
}
