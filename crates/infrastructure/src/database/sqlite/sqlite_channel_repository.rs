use async_trait::async_trait;
use silvermoon_domain::{entities::DataChannel, repositories::ChannelRepository};
use silvermoon_errors::{SilvermoonError, SilvermoonResult};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::database::mapping::MappingHelpers;

const CHANNEL_COLUMNS: &str =
    "uuid, uid, name, description, collector_uuid, topics, metadata, created_at";

pub struct SqliteChannelRepository {
    pool: SqlitePool,
}

impl SqliteChannelRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
    fn row_to_channel(row: &sqlx::sqlite::SqliteRow) -> SilvermoonResult<DataChannel> {
        Ok(DataChannel {
            uuid: MappingHelpers::parse_uuid(row, "uuid")?,
            uid: row.try_get("uid")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            collector_uuid: MappingHelpers::parse_uuid(row, "collector_uuid")?,
            topics: MappingHelpers::parse_json(row, "topics")?,
            metadata: MappingHelpers::parse_json_map(row, "metadata")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl ChannelRepository for SqliteChannelRepository {
    async fn create(&self, channel: &DataChannel) -> SilvermoonResult<DataChannel> {
        sqlx::query(
            r#"
            INSERT INTO data_channels (uuid, uid, name, description, collector_uuid, topics, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(channel.uuid.to_string())
        .bind(&channel.uid)
        .bind(&channel.name)
        .bind(&channel.description)
        .bind(channel.collector_uuid.to_string())
        .bind(MappingHelpers::to_json(&channel.topics, "topics")?)
        .bind(MappingHelpers::to_json(&channel.metadata, "metadata")?)
        .bind(channel.created_at)
        .execute(&self.pool)
        .await
        .map_err(SilvermoonError::Database)?;

        debug!("创建数据通道成功: {} ({})", channel.uid, channel.uuid);
        Ok(channel.clone())
    }
    async fn find_by_uuid(&self, uuid: Uuid) -> SilvermoonResult<Option<DataChannel>> {
        let row = sqlx::query(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM data_channels WHERE uuid = ?"
        ))
        .bind(uuid.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(SilvermoonError::Database)?;

        row.as_ref().map(Self::row_to_channel).transpose()
    }
    async fn find_by_collector_uid(
        &self,
        collector_uuid: Uuid,
        uid: &str,
    ) -> SilvermoonResult<Option<DataChannel>> {
        let row = sqlx::query(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM data_channels WHERE collector_uuid = ? AND uid = ?"
        ))
        .bind(collector_uuid.to_string())
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(SilvermoonError::Database)?;

        row.as_ref().map(Self::row_to_channel).transpose()
    }
}
