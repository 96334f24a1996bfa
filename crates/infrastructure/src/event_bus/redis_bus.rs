use async_trait::async_trait;
use futures::{Stream, StreamExt};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use silvermoon_config::RedisConfig;
use silvermoon_domain::events::{BusMessage, EventName};
use silvermoon_domain::messaging::{EventBus, EventSubscription};
use silvermoon_errors::{SilvermoonError, SilvermoonResult};
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};

/// 基于 Redis PUBLISH/SUBSCRIBE 的事件总线，频道名即事件名
pub struct RedisEventBus {
    client: Client,
    connection: ConnectionManager,
    config: RedisConfig,
}

impl RedisEventBus {
    pub async fn new(config: RedisConfig) -> SilvermoonResult<Self> {
        let client = Client::open(config.build_url()).map_err(|e| {
            SilvermoonError::MessageBus(format!("Failed to create Redis client: {e}"))
        })?;

        let mut connection = Self::connect_with_retry(&client, &config).await?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| SilvermoonError::MessageBus(format!("Redis PING failed: {e}")))?;
        debug!(
            "Successfully connected to Redis at {}:{} ({})",
            config.host, config.port, pong
        );

        Ok(Self {
            client,
            connection,
            config,
        })
    }

    async fn connect_with_retry(
        client: &Client,
        config: &RedisConfig,
    ) -> SilvermoonResult<ConnectionManager> {
        let connect_timeout = Duration::from_secs(config.connection_timeout_seconds);
        let mut last_error = String::from("Unknown");

        for attempt in 0..config.max_retry_attempts {
            match timeout(connect_timeout, client.get_connection_manager()).await {
                Ok(Ok(connection)) => {
                    if attempt > 0 {
                        debug!(
                            "Successfully reconnected to Redis after {} attempts",
                            attempt + 1
                        );
                    }
                    return Ok(connection);
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = format!("timed out after {}s", connect_timeout.as_secs()),
            }

            if attempt + 1 < config.max_retry_attempts {
                warn!(
                    "Failed to connect to Redis (attempt {}/{}): {}. Retrying in {}s...",
                    attempt + 1,
                    config.max_retry_attempts,
                    last_error,
                    config.retry_delay_seconds
                );
                sleep(Duration::from_secs(config.retry_delay_seconds)).await;
            }
        }

        let error_msg = format!(
            "Failed to connect to Redis after {} attempts. Last error: {}",
            config.max_retry_attempts, last_error
        );
        error!("{}", error_msg);
        Err(SilvermoonError::MessageBus(error_msg))
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, message: &BusMessage) -> SilvermoonResult<()> {
        let payload = message.serialize()?;
        let mut connection = self.connection.clone();
        let receivers: i64 = connection
            .publish(message.event_name.as_str(), payload)
            .await
            .map_err(|e| SilvermoonError::MessageBus(format!("Redis PUBLISH failed: {e}")))?;

        debug!(
            "Published {} for subject {} to {} Redis subscribers",
            message.event_name, message.subject_uuid, receivers
        );
        Ok(())
    }

    async fn subscribe(&self, events: &[EventName]) -> SilvermoonResult<Box<dyn EventSubscription>> {
        if events.is_empty() {
            return Err(SilvermoonError::MessageBus(
                "订阅至少需要一个事件类型".to_string(),
            ));
        }

        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| SilvermoonError::MessageBus(format!("Redis pubsub failed: {e}")))?;
        for event in events {
            pubsub.subscribe(event.as_str()).await.map_err(|e| {
                SilvermoonError::MessageBus(format!("Redis SUBSCRIBE {event} failed: {e}"))
            })?;
            debug!("Subscribed to Redis channel {}", event);
        }

        Ok(Box::new(RedisSubscription {
            messages: Box::pin(pubsub.into_on_message()),
        }))
    }
}

pub struct RedisSubscription {
    messages: Pin<Box<dyn Stream<Item = redis::Msg> + Send>>,
}

#[async_trait]
impl EventSubscription for RedisSubscription {
    async fn next(&mut self) -> SilvermoonResult<Option<BusMessage>> {
        let Some(msg) = self.messages.next().await else {
            return Ok(None);
        };
        let payload: String = msg
            .get_payload()
            .map_err(|e| SilvermoonError::Serialization(format!("无法读取总线消息: {e}")))?;
        let message = BusMessage::deserialize(&payload)
            .map_err(|e| SilvermoonError::Serialization(format!("无效的总线消息 {payload}: {e}")))?;
        Ok(Some(message))
    }
}
