use async_trait::async_trait;
use silvermoon_domain::{entities::Topic, repositories::TopicRepository};
use silvermoon_errors::{SilvermoonError, SilvermoonResult};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::database::mapping::MappingHelpers;

pub struct SqliteTopicRepository {
    pool: SqlitePool,
}

impl SqliteTopicRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TopicRepository for SqliteTopicRepository {
    async fn create(&self, topic: &Topic) -> SilvermoonResult<Topic> {
        sqlx::query("INSERT INTO topics (uuid, name, description) VALUES (?, ?, ?)")
            .bind(topic.uuid.to_string())
            .bind(&topic.name)
            .bind(&topic.description)
            .execute(&self.pool)
            .await
            .map_err(SilvermoonError::Database)?;

        debug!("创建主题成功: {}", topic.name);
        Ok(topic.clone())
    }
    async fn find_by_name(&self, name: &str) -> SilvermoonResult<Option<Topic>> {
        let row = sqlx::query("SELECT uuid, name, description FROM topics WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(SilvermoonError::Database)?;

        match row {
            Some(row) => Ok(Some(Topic {
                uuid: MappingHelpers::parse_uuid(&row, "uuid")?,
                name: row.try_get("name")?,
                description: row.try_get("description")?,
            })),
            None => Ok(None),
        }
    }
}
