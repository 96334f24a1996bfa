use std::error::Error as _;
use std::fmt::Write as _;
use std::sync::Arc;

use silvermoon_domain::entities::{JsonMap, WorkerError};
use silvermoon_domain::repositories::WorkerErrorRepository;
use silvermoon_errors::SilvermoonError;
use tracing::error;

/// 把流水线失败写成 WorkerError 记录，自身从不失败
#[derive(Clone)]
pub struct ErrorReporter {
    worker_name: String,
    errors: Arc<dyn WorkerErrorRepository>,
}

impl ErrorReporter {
    pub fn new(worker_name: impl Into<String>, errors: Arc<dyn WorkerErrorRepository>) -> Self {
        Self {
            worker_name: worker_name.into(),
            errors,
        }
    }

    pub fn worker_name(&self) -> &str {
        &self.worker_name
    }

    pub async fn report(&self, err: &SilvermoonError, metadata: Option<JsonMap>) {
        error!(
            "Worker {} 处理失败 [{}]: {}",
            self.worker_name,
            err.kind(),
            err
        );

        let mut record = WorkerError::new(&self.worker_name, err.kind(), err.to_string());
        record.traceback = Some(Self::trace(err));
        record.metadata = metadata.unwrap_or_default();

        if let Err(e) = self.errors.create(&record).await {
            error!("写入WorkerError失败: {} (原始错误: {})", e, err);
        }
    }

    /// 错误本身及其 `source()` 链
    pub fn trace(err: &SilvermoonError) -> String {
        let mut trace = format!("{err:?}\n{err}");
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = write!(trace, "\nCaused by: {cause}");
            source = cause.source();
        }
        trace
    }
}
