//! 需要本地 Redis：`cargo test -- --ignored`

use silvermoon_config::RedisConfig;
use silvermoon_domain::events::{BusMessage, EventName};
use silvermoon_domain::messaging::EventBus;
use silvermoon_infrastructure::RedisEventBus;
use std::time::Duration;
use uuid::Uuid;

fn test_config() -> RedisConfig {
    RedisConfig {
        max_retry_attempts: 1,
        connection_timeout_seconds: 2,
        ..RedisConfig::default()
    }
}

#[tokio::test]
#[ignore]
async fn test_redis_publish_reaches_all_subscribers() {
    let bus = RedisEventBus::new(test_config()).await.unwrap();
    let mut first = bus.subscribe(&[EventName::NewData]).await.unwrap();
    let mut second = bus
        .subscribe(&[EventName::NewData, EventName::NewAnalysisResult])
        .await
        .unwrap();

    let message = BusMessage::new_data(Uuid::new_v4(), Uuid::new_v4());
    bus.publish(&message).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), first.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, Some(message));
    let received = tokio::time::timeout(Duration::from_secs(5), second.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, Some(message));
}

#[tokio::test]
#[ignore]
async fn test_redis_malformed_payload_is_serialization_error() {
    let config = test_config();
    let bus = RedisEventBus::new(config.clone()).await.unwrap();
    let mut subscription = bus.subscribe(&[EventName::NewData]).await.unwrap();

    let client = redis::Client::open(config.build_url()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let _: i64 = redis::AsyncCommands::publish(&mut conn, "NEW_DATA", "not json")
        .await
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), subscription.next())
        .await
        .unwrap();
    assert!(matches!(
        result,
        Err(silvermoon_errors::SilvermoonError::Serialization(_))
    ));
}

#[tokio::test]
async fn test_redis_unreachable_is_message_bus_error() {
    let config = RedisConfig {
        port: 1,
        retry_delay_seconds: 1,
        ..test_config()
    };
    let result = RedisEventBus::new(config).await;
    assert!(matches!(
        result,
        Err(silvermoon_errors::SilvermoonError::MessageBus(_))
    ));
}
