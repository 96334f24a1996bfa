use async_trait::async_trait;
use silvermoon_domain::{entities::Record, repositories::RecordRepository};
use silvermoon_errors::{SilvermoonError, SilvermoonResult};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::database::mapping::MappingHelpers;

pub struct SqliteRecordRepository {
    pool: SqlitePool,
}

impl SqliteRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordRepository for SqliteRecordRepository {
    async fn create(&self, record: &Record) -> SilvermoonResult<Record> {
        sqlx::query(
            r#"
            INSERT INTO records (uuid, channel_uuid, payload, metadata, friendly_text, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.uuid.to_string())
        .bind(record.channel_uuid.to_string())
        .bind(MappingHelpers::to_json(&record.payload, "payload")?)
        .bind(MappingHelpers::to_json(&record.metadata, "metadata")?)
        .bind(&record.friendly_text)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(SilvermoonError::Database)?;

        debug!("保存采集记录成功: {}", record.uuid);
        Ok(record.clone())
    }
    async fn find_by_uuid(&self, uuid: Uuid) -> SilvermoonResult<Option<Record>> {
        let row = sqlx::query(
            "SELECT uuid, channel_uuid, payload, metadata, friendly_text, created_at FROM records WHERE uuid = ?",
        )
        .bind(uuid.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(SilvermoonError::Database)?;

        match row {
            Some(row) => Ok(Some(Record {
                uuid: MappingHelpers::parse_uuid(&row, "uuid")?,
                channel_uuid: MappingHelpers::parse_uuid(&row, "channel_uuid")?,
                payload: MappingHelpers::parse_json_map(&row, "payload")?,
                metadata: MappingHelpers::parse_json_map(&row, "metadata")?,
                friendly_text: row.try_get("friendly_text")?,
                created_at: row.try_get("created_at")?,
            })),
            None => Ok(None),
        }
    }
}
