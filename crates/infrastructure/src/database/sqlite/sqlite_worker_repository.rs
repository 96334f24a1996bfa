use async_trait::async_trait;
use silvermoon_domain::{
    entities::{Worker, WorkerKind},
    repositories::WorkerRepository,
};
use silvermoon_errors::{SilvermoonError, SilvermoonResult};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::database::mapping::MappingHelpers;

const WORKER_COLUMNS: &str =
    "uuid, name, kind, description, config, metadata, task_parameters, created_at";

pub struct SqliteWorkerRepository {
    pool: SqlitePool,
}

impl SqliteWorkerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
    fn row_to_worker(row: &sqlx::sqlite::SqliteRow) -> SilvermoonResult<Worker> {
        let kind: String = row.try_get("kind")?;
        Ok(Worker {
            uuid: MappingHelpers::parse_uuid(row, "uuid")?,
            name: row.try_get("name")?,
            kind: kind.parse::<WorkerKind>()?,
            description: row.try_get("description")?,
            config: MappingHelpers::parse_json_map(row, "config")?,
            metadata: MappingHelpers::parse_json_map(row, "metadata")?,
            task_parameters: MappingHelpers::parse_json_map(row, "task_parameters")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl WorkerRepository for SqliteWorkerRepository {
    async fn create(&self, worker: &Worker) -> SilvermoonResult<Worker> {
        sqlx::query(
            r#"
            INSERT INTO workers (uuid, name, kind, description, config, metadata, task_parameters, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(worker.uuid.to_string())
        .bind(&worker.name)
        .bind(worker.kind.as_str())
        .bind(&worker.description)
        .bind(MappingHelpers::to_json(&worker.config, "config")?)
        .bind(MappingHelpers::to_json(&worker.metadata, "metadata")?)
        .bind(MappingHelpers::to_json(&worker.task_parameters, "task_parameters")?)
        .bind(worker.created_at)
        .execute(&self.pool)
        .await
        .map_err(SilvermoonError::Database)?;

        debug!("创建Worker成功: {} ({})", worker.name, worker.uuid);
        Ok(worker.clone())
    }
    async fn find_by_uuid(&self, uuid: uuid::Uuid) -> SilvermoonResult<Option<Worker>> {
        let row = sqlx::query(&format!("SELECT {WORKER_COLUMNS} FROM workers WHERE uuid = ?"))
            .bind(uuid.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(SilvermoonError::Database)?;

        row.as_ref().map(Self::row_to_worker).transpose()
    }
    async fn find_by_name(&self, name: &str) -> SilvermoonResult<Option<Worker>> {
        let row = sqlx::query(&format!("SELECT {WORKER_COLUMNS} FROM workers WHERE name = ?"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(SilvermoonError::Database)?;

        row.as_ref().map(Self::row_to_worker).transpose()
    }
    async fn update(&self, worker: &Worker) -> SilvermoonResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE workers
            SET description = ?, config = ?, metadata = ?, task_parameters = ?
            WHERE uuid = ?
            "#,
        )
        .bind(&worker.description)
        .bind(MappingHelpers::to_json(&worker.config, "config")?)
        .bind(MappingHelpers::to_json(&worker.metadata, "metadata")?)
        .bind(MappingHelpers::to_json(&worker.task_parameters, "task_parameters")?)
        .bind(worker.uuid.to_string())
        .execute(&self.pool)
        .await
        .map_err(SilvermoonError::Database)?;

        if result.rows_affected() == 0 {
            return Err(SilvermoonError::worker_not_found(worker.uuid.to_string()));
        }

        debug!("更新Worker成功: {}", worker.name);
        Ok(())
    }
}
