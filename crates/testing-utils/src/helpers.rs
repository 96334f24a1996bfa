//! Integration test helpers

use silvermoon_domain::entities::{DataChannel, Record, Worker};
use silvermoon_domain::repositories::Repositories;
use std::future::Future;
use std::time::Duration;

use crate::builders::{channel, collector, record};

/// 保存一个采集器、一个通道和一条记录，返回三者
pub async fn seed_record(
    repos: &Repositories,
    collector_name: &str,
    payload: serde_json::Value,
) -> (Worker, DataChannel, Record) {
    let worker = collector(collector_name);
    repos.workers.create(&worker).await.unwrap();
    let channel = channel(worker.uuid, "test-channel");
    repos.channels.create(&channel).await.unwrap();
    let record = record(channel.uuid, payload);
    repos.records.create(&record).await.unwrap();
    (worker, channel, record)
}

/// 轮询直到条件成立，超时则 panic
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within {timeout:?}");
}
