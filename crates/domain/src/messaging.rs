use async_trait::async_trait;
use silvermoon_errors::SilvermoonResult;

use crate::events::{BusMessage, EventName};

/// 事件总线抽象
///
/// 广播语义：每个当前订阅了该事件类型的订阅者都会收到消息，而不是在订阅者之间负载均衡。
#[async_trait]
pub trait EventBus: Send + Sync {
    /// 发布消息到 `message.event_name` 对应的频道
    async fn publish(&self, message: &BusMessage) -> SilvermoonResult<()>;

    /// 订阅指定事件类型，返回一个不可重启的消息序列
    async fn subscribe(&self, events: &[EventName]) -> SilvermoonResult<Box<dyn EventSubscription>>;
}

/// 一个订阅者的接收端
#[async_trait]
pub trait EventSubscription: Send {
    /// 阻塞直到收到下一条消息；总线关闭时返回 `Ok(None)`
    async fn next(&mut self) -> SilvermoonResult<Option<BusMessage>>;
}
