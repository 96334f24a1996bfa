use async_trait::async_trait;
use silvermoon_domain::{entities::WorkerError, repositories::WorkerErrorRepository};
use silvermoon_errors::{ErrorKind, SilvermoonError, SilvermoonResult};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::database::mapping::MappingHelpers;

pub struct SqliteWorkerErrorRepository {
    pool: SqlitePool,
}

impl SqliteWorkerErrorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
    fn row_to_error(row: &sqlx::sqlite::SqliteRow) -> SilvermoonResult<WorkerError> {
        let error_type: String = row.try_get("error_type")?;
        Ok(WorkerError {
            uuid: MappingHelpers::parse_uuid(row, "uuid")?,
            worker_name: row.try_get("worker_name")?,
            error_type: error_type.parse::<ErrorKind>()?,
            error_summary: row.try_get("error_summary")?,
            traceback: row.try_get("traceback")?,
            metadata: MappingHelpers::parse_json_map(row, "metadata")?,
            read: row.try_get("read")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl WorkerErrorRepository for SqliteWorkerErrorRepository {
    async fn create(&self, error: &WorkerError) -> SilvermoonResult<WorkerError> {
        sqlx::query(
            r#"
            INSERT INTO worker_errors (uuid, worker_name, error_type, error_summary, traceback, metadata, read, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(error.uuid.to_string())
        .bind(&error.worker_name)
        .bind(error.error_type.as_str())
        .bind(&error.error_summary)
        .bind(&error.traceback)
        .bind(MappingHelpers::to_json(&error.metadata, "metadata")?)
        .bind(error.read)
        .bind(error.created_at)
        .execute(&self.pool)
        .await
        .map_err(SilvermoonError::Database)?;

        debug!("记录Worker错误: {} [{}]", error.worker_name, error.error_type);
        Ok(error.clone())
    }
    async fn list(&self) -> SilvermoonResult<Vec<WorkerError>> {
        let rows = sqlx::query(
            "SELECT uuid, worker_name, error_type, error_summary, traceback, metadata, read, created_at FROM worker_errors ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(SilvermoonError::Database)?;

        rows.iter().map(Self::row_to_error).collect()
    }
    async fn count_unread(&self) -> SilvermoonResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM worker_errors WHERE read = 0")
            .fetch_one(&self.pool)
            .await
            .map_err(SilvermoonError::Database)?;

        Ok(row.try_get::<i64, _>("count")?)
    }
    async fn mark_read(&self, uuid: Uuid) -> SilvermoonResult<bool> {
        let result = sqlx::query("UPDATE worker_errors SET read = 1 WHERE uuid = ?")
            .bind(uuid.to_string())
            .execute(&self.pool)
            .await
            .map_err(SilvermoonError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
