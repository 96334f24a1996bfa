//! 采集器服务
//!
//! 外层是固定退避的重连循环，内层逐条读取数据源并保存为记录。

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use silvermoon_domain::entities::JsonMap;
use silvermoon_errors::{ErrorKind, SilvermoonError, SilvermoonResult};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::components::ErrorReporter;
use crate::registry::CollectorWorker;

/// 数据源产出的一条数据：`{"channel": "...", "payload": {...}, "text": "..."}`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CollectedItem {
    pub channel: String,
    #[serde(default)]
    pub payload: JsonMap,
    #[serde(default)]
    pub text: Option<String>,
}

/// 采集器的外部数据源
#[async_trait]
pub trait CollectorSource: Send {
    /// 下一条数据；数据源正常结束时返回 `Ok(None)`
    ///
    /// `DataError` 只跳过当前条目，其余错误视为断开，触发重连。
    async fn next_item(&mut self) -> SilvermoonResult<Option<CollectedItem>>;

    fn describe(&self) -> String;
}

/// 按行读取 JSON 的数据源，空行会被跳过
pub struct JsonLinesSource<R> {
    lines: Lines<BufReader<R>>,
    description: String,
    line_number: usize,
}

impl<R: AsyncRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(reader: R, description: impl Into<String>) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            description: description.into(),
            line_number: 0,
        }
    }
}

impl JsonLinesSource<tokio::io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin(), "stdin")
    }
}

impl JsonLinesSource<tokio::fs::File> {
    pub async fn open(path: impl AsRef<Path>) -> SilvermoonResult<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            SilvermoonError::external_service(format!("无法打开数据源 {}: {e}", path.display()))
        })?;
        Ok(Self::new(file, path.display().to_string()))
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> CollectorSource for JsonLinesSource<R> {
    async fn next_item(&mut self) -> SilvermoonResult<Option<CollectedItem>> {
        loop {
            let line = self.lines.next_line().await.map_err(|e| {
                SilvermoonError::external_service(format!("读取数据源 {} 失败: {e}", self.description))
            })?;
            let Some(line) = line else {
                return Ok(None);
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(&line).map(Some).map_err(|e| {
                SilvermoonError::Serialization(format!(
                    "{} 第 {} 行不是合法的数据: {e}",
                    self.description, self.line_number
                ))
            });
        }
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

enum SessionEnd {
    Exhausted,
    Shutdown,
}

pub struct CollectorService {
    collector: CollectorWorker,
    reporter: ErrorReporter,
    reconnect_delay: Duration,
}

impl CollectorService {
    pub fn new(collector: CollectorWorker, reconnect_delay: Duration) -> Self {
        let reporter = ErrorReporter::new(
            collector.name(),
            collector.handle().repositories().errors.clone(),
        );
        Self {
            collector,
            reporter,
            reconnect_delay,
        }
    }

    pub fn collector(&self) -> &CollectorWorker {
        &self.collector
    }

    /// 连接数据源并持续采集；断开后等待 `reconnect_delay` 再用 `connect` 重新连接
    ///
    /// 数据源正常结束或收到关闭信号时返回。
    pub async fn run<F, Fut, S>(
        &self,
        mut connect: F,
        mut shutdown: broadcast::Receiver<()>,
    ) -> SilvermoonResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SilvermoonResult<S>>,
        S: CollectorSource,
    {
        loop {
            match connect().await {
                Ok(mut source) => {
                    info!("采集器 {} 已连接数据源 {}", self.collector.name(), source.describe());
                    match self.consume(&mut source, &mut shutdown).await {
                        Ok(SessionEnd::Exhausted) => {
                            info!("数据源 {} 已结束", source.describe());
                            return Ok(());
                        }
                        Ok(SessionEnd::Shutdown) => return Ok(()),
                        Err(e) => {
                            warn!("数据源 {} 断开: {}", source.describe(), e);
                            self.reporter.report(&e, None).await;
                        }
                    }
                }
                Err(e) => {
                    warn!("采集器 {} 连接数据源失败: {}", self.collector.name(), e);
                    self.reporter.report(&e, None).await;
                }
            }

            info!("{:?} 后重新连接", self.reconnect_delay);
            tokio::select! {
                _ = shutdown.recv() => return Ok(()),
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }

    async fn consume<S: CollectorSource>(
        &self,
        source: &mut S,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> SilvermoonResult<SessionEnd> {
        loop {
            let next = tokio::select! {
                _ = shutdown.recv() => {
                    info!("采集器 {} 收到关闭信号", self.collector.name());
                    return Ok(SessionEnd::Shutdown);
                }
                next = source.next_item() => next,
            };

            match next {
                Ok(Some(item)) => self.store(item).await,
                Ok(None) => return Ok(SessionEnd::Exhausted),
                Err(e) if e.kind() == ErrorKind::Data => {
                    self.reporter.report(&e, None).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn store(&self, item: CollectedItem) {
        match self
            .collector
            .add_data(&item.channel, item.payload, item.text)
            .await
        {
            Ok(record) => debug!("通道 {} 新增记录 {}", item.channel, record.uuid),
            Err(e) => self.reporter.report(&e, None).await,
        }
    }
}
