use async_trait::async_trait;
use silvermoon_domain::{
    entities::{AnalysisResult, Importance},
    repositories::ResultRepository,
};
use silvermoon_errors::{SilvermoonError, SilvermoonResult};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::database::mapping::MappingHelpers;

const RESULT_COLUMNS: &str = "uuid, name, analyser_uuid, task_uuid, origin_record_uuid, origin_result_uuid, payload, metadata, display, importance, hidden, created_at";

pub struct SqliteResultRepository {
    pool: SqlitePool,
}

impl SqliteResultRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
    fn row_to_result(row: &sqlx::sqlite::SqliteRow) -> SilvermoonResult<AnalysisResult> {
        let importance: String = row.try_get("importance")?;
        Ok(AnalysisResult {
            uuid: MappingHelpers::parse_uuid(row, "uuid")?,
            name: row.try_get("name")?,
            analyser_uuid: MappingHelpers::parse_uuid(row, "analyser_uuid")?,
            task_uuid: MappingHelpers::parse_uuid(row, "task_uuid")?,
            origin_record_uuid: MappingHelpers::parse_uuid(row, "origin_record_uuid")?,
            origin_result_uuid: MappingHelpers::parse_optional_uuid(row, "origin_result_uuid")?,
            payload: MappingHelpers::parse_json_map(row, "payload")?,
            metadata: MappingHelpers::parse_json_map(row, "metadata")?,
            display: MappingHelpers::parse_json_map(row, "display")?,
            importance: importance.parse::<Importance>()?,
            hidden: row.try_get("hidden")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl ResultRepository for SqliteResultRepository {
    async fn create(&self, result: &AnalysisResult) -> SilvermoonResult<AnalysisResult> {
        sqlx::query(
            r#"
            INSERT INTO analysis_results (uuid, name, analyser_uuid, task_uuid, origin_record_uuid, origin_result_uuid,
                                          payload, metadata, display, importance, hidden, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(result.uuid.to_string())
        .bind(&result.name)
        .bind(result.analyser_uuid.to_string())
        .bind(result.task_uuid.to_string())
        .bind(result.origin_record_uuid.to_string())
        .bind(result.origin_result_uuid.map(|uuid| uuid.to_string()))
        .bind(MappingHelpers::to_json(&result.payload, "payload")?)
        .bind(MappingHelpers::to_json(&result.metadata, "metadata")?)
        .bind(MappingHelpers::to_json(&result.display, "display")?)
        .bind(result.importance.as_str())
        .bind(result.hidden)
        .bind(result.created_at)
        .execute(&self.pool)
        .await
        .map_err(SilvermoonError::Database)?;

        debug!("保存分析结果成功: {} ({})", result.name, result.uuid);
        Ok(result.clone())
    }
    async fn find_by_uuid(&self, uuid: Uuid) -> SilvermoonResult<Option<AnalysisResult>> {
        let row = sqlx::query(&format!(
            "SELECT {RESULT_COLUMNS} FROM analysis_results WHERE uuid = ?"
        ))
        .bind(uuid.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(SilvermoonError::Database)?;

        row.as_ref().map(Self::row_to_result).transpose()
    }
    async fn find_by_task(&self, task_uuid: Uuid) -> SilvermoonResult<Vec<AnalysisResult>> {
        let rows = sqlx::query(&format!(
            "SELECT {RESULT_COLUMNS} FROM analysis_results WHERE task_uuid = ? ORDER BY created_at DESC"
        ))
        .bind(task_uuid.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(SilvermoonError::Database)?;

        rows.iter().map(Self::row_to_result).collect()
    }
}
