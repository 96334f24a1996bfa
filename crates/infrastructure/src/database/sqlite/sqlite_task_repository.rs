use async_trait::async_trait;
use silvermoon_domain::{entities::AnalysisTask, repositories::TaskRepository};
use silvermoon_errors::{SilvermoonError, SilvermoonResult};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::database::mapping::MappingHelpers;

const TASK_COLUMNS: &str = "uuid, name, description, analyser_uuid, topics, parameters, triggers";

/// 分析任务仓储，触发器以 JSON 数组嵌入在任务行中
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> SilvermoonResult<AnalysisTask> {
        Ok(AnalysisTask {
            uuid: MappingHelpers::parse_uuid(row, "uuid")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            analyser_uuid: MappingHelpers::parse_uuid(row, "analyser_uuid")?,
            topics: MappingHelpers::parse_json(row, "topics")?,
            parameters: MappingHelpers::parse_json_map(row, "parameters")?,
            triggers: MappingHelpers::parse_json(row, "triggers")?,
        })
    }

    /// 解码失败时带上任务标识，便于定位被手工改坏的行
    fn decode_task(row: &sqlx::sqlite::SqliteRow) -> SilvermoonResult<AnalysisTask> {
        Self::row_to_task(row).map_err(|e| {
            let uuid: String = row.try_get("uuid").unwrap_or_default();
            let name: String = row.try_get("name").unwrap_or_default();
            SilvermoonError::Serialization(format!("分析任务 '{name}' ({uuid}) 无法解析: {e}"))
        })
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &AnalysisTask) -> SilvermoonResult<AnalysisTask> {
        sqlx::query(
            r#"
            INSERT INTO analysis_tasks (uuid, name, description, analyser_uuid, topics, parameters, triggers)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(task.uuid.to_string())
        .bind(&task.name)
        .bind(&task.description)
        .bind(task.analyser_uuid.to_string())
        .bind(MappingHelpers::to_json(&task.topics, "topics")?)
        .bind(MappingHelpers::to_json(&task.parameters, "parameters")?)
        .bind(MappingHelpers::to_json(&task.triggers, "triggers")?)
        .execute(&self.pool)
        .await
        .map_err(SilvermoonError::Database)?;

        debug!("创建分析任务成功: {} ({})", task.name, task.uuid);
        Ok(task.clone())
    }
    async fn find_by_uuid(&self, uuid: Uuid) -> SilvermoonResult<Option<AnalysisTask>> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM analysis_tasks WHERE uuid = ?"
        ))
        .bind(uuid.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(SilvermoonError::Database)?;

        row.as_ref().map(Self::row_to_task).transpose()
    }
    async fn find_by_analyser(
        &self,
        analyser_uuid: Uuid,
    ) -> SilvermoonResult<Vec<SilvermoonResult<AnalysisTask>>> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM analysis_tasks WHERE analyser_uuid = ? ORDER BY rowid"
        ))
        .bind(analyser_uuid.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(SilvermoonError::Database)?;

        Ok(rows.iter().map(Self::decode_task).collect())
    }
}
