//! 事件总线实现与工厂

pub mod in_memory;
pub mod redis_bus;

pub use in_memory::InMemoryEventBus;
pub use redis_bus::RedisEventBus;

use silvermoon_config::{EventBusConfig, EventBusType};
use silvermoon_domain::messaging::EventBus;
use silvermoon_errors::SilvermoonResult;
use std::sync::Arc;
use tracing::{debug, info};

pub struct EventBusFactory;

impl EventBusFactory {
    pub async fn create(config: &EventBusConfig) -> SilvermoonResult<Arc<dyn EventBus>> {
        debug!("Creating event bus with type: {:?}", config.bus_type);

        match config.bus_type {
            EventBusType::Redis => {
                info!("Initializing Redis event bus");
                let bus = RedisEventBus::new(config.redis.clone()).await?;
                Ok(Arc::new(bus))
            }
            EventBusType::InMemory => {
                info!("Initializing in-memory event bus");
                Ok(Arc::new(InMemoryEventBus::with_capacity(config.capacity)))
            }
        }
    }
}
