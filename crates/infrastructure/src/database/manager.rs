use silvermoon_config::DatabaseConfig;
use silvermoon_domain::repositories::Repositories;
use silvermoon_errors::{SilvermoonError, SilvermoonResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::sqlite::{
    SqliteChannelRepository, SqliteRecordRepository, SqliteResultRepository,
    SqliteTaskRepository, SqliteTopicRepository, SqliteWorkerErrorRepository,
    SqliteWorkerRepository,
};

const SCHEMA: [&str; 8] = [
    r#"
    CREATE TABLE IF NOT EXISTS workers (
        uuid TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        kind TEXT NOT NULL,
        description TEXT,
        config TEXT NOT NULL DEFAULT '{}',
        metadata TEXT NOT NULL DEFAULT '{}',
        task_parameters TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS topics (
        uuid TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS data_channels (
        uuid TEXT PRIMARY KEY,
        uid TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        collector_uuid TEXT NOT NULL REFERENCES workers(uuid),
        topics TEXT NOT NULL DEFAULT '[]',
        metadata TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        UNIQUE (collector_uuid, uid)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS records (
        uuid TEXT PRIMARY KEY,
        channel_uuid TEXT NOT NULL REFERENCES data_channels(uuid),
        payload TEXT NOT NULL DEFAULT '{}',
        metadata TEXT NOT NULL DEFAULT '{}',
        friendly_text TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS analysis_tasks (
        uuid TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        analyser_uuid TEXT NOT NULL REFERENCES workers(uuid),
        topics TEXT NOT NULL DEFAULT '[]',
        parameters TEXT NOT NULL DEFAULT '{}',
        triggers TEXT NOT NULL DEFAULT '[]'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS analysis_results (
        uuid TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        analyser_uuid TEXT NOT NULL REFERENCES workers(uuid),
        task_uuid TEXT NOT NULL,
        origin_record_uuid TEXT NOT NULL,
        origin_result_uuid TEXT,
        payload TEXT NOT NULL DEFAULT '{}',
        metadata TEXT NOT NULL DEFAULT '{}',
        display TEXT NOT NULL DEFAULT '{}',
        importance TEXT NOT NULL DEFAULT 'normal',
        hidden INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS worker_errors (
        uuid TEXT PRIMARY KEY,
        worker_name TEXT NOT NULL,
        error_type TEXT NOT NULL,
        error_summary TEXT NOT NULL,
        traceback TEXT,
        metadata TEXT NOT NULL DEFAULT '{}',
        read INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_analysis_tasks_analyser ON analysis_tasks(analyser_uuid)",
];

pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> SilvermoonResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(SilvermoonError::Database)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = Self::pool_options(config)
            .connect_with(options)
            .await
            .map_err(SilvermoonError::Database)?;

        info!("已连接数据库: {}", config.url);
        Ok(Self { pool })
    }

    /// 内存库的每个连接都是独立的数据库，连接一旦关闭数据就丢失，
    /// 所以只保留一个永不过期的连接
    fn pool_options(config: &DatabaseConfig) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds));

        if Self::is_memory(&config.url) {
            options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            options.max_connections(config.max_connections)
        }
    }

    fn is_memory(url: &str) -> bool {
        url.contains(":memory:") || url.contains("mode=memory")
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 建表，可重复执行
    pub async fn migrate(&self) -> SilvermoonResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(SilvermoonError::Database)?;
        }
        debug!("数据库表结构已就绪");
        Ok(())
    }

    pub async fn health_check(&self) -> SilvermoonResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(SilvermoonError::Database)?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// 基于同一个连接池构建全部仓储
    pub fn repositories(&self) -> Repositories {
        Repositories {
            workers: Arc::new(SqliteWorkerRepository::new(self.pool.clone())),
            topics: Arc::new(SqliteTopicRepository::new(self.pool.clone())),
            channels: Arc::new(SqliteChannelRepository::new(self.pool.clone())),
            records: Arc::new(SqliteRecordRepository::new(self.pool.clone())),
            tasks: Arc::new(SqliteTaskRepository::new(self.pool.clone())),
            results: Arc::new(SqliteResultRepository::new(self.pool.clone())),
            errors: Arc::new(SqliteWorkerErrorRepository::new(self.pool.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> DatabaseConfig {
        DatabaseConfig {
            url: url.to_string(),
            max_connections: 8,
            ..DatabaseConfig::default()
        }
    }

    #[test]
    fn test_memory_pool_keeps_single_connection_alive() {
        let options = DatabaseManager::pool_options(&config("sqlite::memory:"));
        assert_eq!(options.get_max_connections(), 1);
        assert_eq!(options.get_min_connections(), 1);
        assert_eq!(options.get_idle_timeout(), None);
        assert_eq!(options.get_max_lifetime(), None);
    }

    #[test]
    fn test_file_pool_uses_configured_size() {
        let options = DatabaseManager::pool_options(&config("sqlite://silvermoon.db?mode=rwc"));
        assert_eq!(options.get_max_connections(), 8);
        assert_eq!(options.get_min_connections(), 0);
        assert!(options.get_idle_timeout().is_some());
    }

    #[tokio::test]
    async fn test_memory_database_survives_idle_period() {
        let manager = DatabaseManager::new(&config("sqlite::memory:")).await.unwrap();
        manager.migrate().await.unwrap();
        sqlx::query("INSERT INTO topics (uuid, name) VALUES ('t-1', 'finance')")
            .execute(manager.pool())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM topics")
            .fetch_one(manager.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(manager.pool().size(), 1);
    }
}
