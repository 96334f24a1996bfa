use async_trait::async_trait;
use silvermoon_domain::events::{BusMessage, EventName};
use silvermoon_domain::messaging::{EventBus, EventSubscription};
use silvermoon_errors::{SilvermoonError, SilvermoonResult};
use tokio::sync::broadcast;
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 1024;

/// 内存事件总线
///
/// 单个 tokio broadcast 通道承载所有事件类型，订阅端按事件名过滤。
/// 适用于单进程部署与测试。
#[derive(Debug, Clone)]
pub struct InMemoryEventBus {
    sender: broadcast::Sender<BusMessage>,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, message: &BusMessage) -> SilvermoonResult<()> {
        // 没有订阅者时消息直接丢弃，与 Redis PUBLISH 一致
        match self.sender.send(*message) {
            Ok(receivers) => debug!(
                "Published {} to {} in-memory subscribers",
                message.event_name, receivers
            ),
            Err(_) => debug!("No subscribers for {}, message dropped", message.event_name),
        }
        Ok(())
    }

    async fn subscribe(&self, events: &[EventName]) -> SilvermoonResult<Box<dyn EventSubscription>> {
        if events.is_empty() {
            return Err(SilvermoonError::MessageBus(
                "订阅至少需要一个事件类型".to_string(),
            ));
        }
        Ok(Box::new(InMemorySubscription {
            receiver: self.sender.subscribe(),
            events: events.to_vec(),
        }))
    }
}

pub struct InMemorySubscription {
    receiver: broadcast::Receiver<BusMessage>,
    events: Vec<EventName>,
}

#[async_trait]
impl EventSubscription for InMemorySubscription {
    async fn next(&mut self) -> SilvermoonResult<Option<BusMessage>> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if self.events.contains(&message.event_name) => {
                    return Ok(Some(message))
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("In-memory subscriber lagged, {} messages skipped", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_broadcast_to_every_subscriber() {
        let bus = InMemoryEventBus::new();
        let mut first = bus.subscribe(&[EventName::NewData]).await.unwrap();
        let mut second = bus.subscribe(&[EventName::NewData]).await.unwrap();

        let message = BusMessage::new_data(Uuid::new_v4(), Uuid::new_v4());
        bus.publish(&message).await.unwrap();

        assert_eq!(first.next().await.unwrap(), Some(message));
        assert_eq!(second.next().await.unwrap(), Some(message));
    }

    #[tokio::test]
    async fn test_subscription_filters_event_names() {
        let bus = InMemoryEventBus::new();
        let mut results_only = bus.subscribe(&[EventName::NewAnalysisResult]).await.unwrap();

        let data = BusMessage::new_data(Uuid::new_v4(), Uuid::new_v4());
        let result = BusMessage::new_analysis_result(Uuid::new_v4(), Uuid::new_v4());
        bus.publish(&data).await.unwrap();
        bus.publish(&result).await.unwrap();

        assert_eq!(results_only.next().await.unwrap(), Some(result));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = InMemoryEventBus::new();
        let message = BusMessage::new_data(Uuid::new_v4(), Uuid::new_v4());
        assert!(bus.publish(&message).await.is_ok());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_continues() {
        let bus = InMemoryEventBus::with_capacity(2);
        let mut subscription = bus.subscribe(&[EventName::NewData]).await.unwrap();

        let source = Uuid::new_v4();
        let mut last = None;
        for _ in 0..5 {
            let message = BusMessage::new_data(source, Uuid::new_v4());
            bus.publish(&message).await.unwrap();
            last = Some(message);
        }

        // 最早的消息被覆盖，订阅仍然可用
        let mut received = Vec::new();
        for _ in 0..2 {
            received.push(subscription.next().await.unwrap().unwrap());
        }
        assert_eq!(received.last().copied(), last);
    }

    #[tokio::test]
    async fn test_subscribe_requires_events() {
        let bus = InMemoryEventBus::new();
        assert!(bus.subscribe(&[]).await.is_err());
    }
}
