//! SQLite 行映射工具
//!
//! UUID 以文本保存，JSON 字典与列表以 TEXT 保存，这里集中处理它们的解析。

use serde::de::DeserializeOwned;
use silvermoon_domain::entities::JsonMap;
use silvermoon_errors::{SilvermoonError, SilvermoonResult};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

pub struct MappingHelpers;

impl MappingHelpers {
    pub fn parse_uuid(row: &SqliteRow, field_name: &str) -> SilvermoonResult<Uuid> {
        let raw: String = row.try_get(field_name)?;
        Uuid::parse_str(&raw)
            .map_err(|e| SilvermoonError::Serialization(format!("解析 {field_name} 失败: {e}")))
    }

    pub fn parse_optional_uuid(row: &SqliteRow, field_name: &str) -> SilvermoonResult<Option<Uuid>> {
        match row.try_get::<Option<String>, _>(field_name)? {
            Some(raw) => Uuid::parse_str(&raw).map(Some).map_err(|e| {
                SilvermoonError::Serialization(format!("解析 {field_name} 失败: {e}"))
            }),
            None => Ok(None),
        }
    }

    /// 空值按空字典处理
    pub fn parse_json_map(row: &SqliteRow, field_name: &str) -> SilvermoonResult<JsonMap> {
        match row.try_get::<Option<String>, _>(field_name)? {
            Some(json_str) => serde_json::from_str(&json_str).map_err(|e| {
                SilvermoonError::Serialization(format!("解析 {field_name} 失败: {e}"))
            }),
            None => Ok(JsonMap::new()),
        }
    }

    pub fn parse_json<T: DeserializeOwned + Default>(
        row: &SqliteRow,
        field_name: &str,
    ) -> SilvermoonResult<T> {
        match row.try_get::<Option<String>, _>(field_name)? {
            Some(json_str) => serde_json::from_str(&json_str).map_err(|e| {
                SilvermoonError::Serialization(format!("解析 {field_name} 失败: {e}"))
            }),
            None => Ok(T::default()),
        }
    }

    pub fn to_json<T: serde::Serialize + ?Sized>(
        value: &T,
        field_name: &str,
    ) -> SilvermoonResult<String> {
        serde_json::to_string(value)
            .map_err(|e| SilvermoonError::Serialization(format!("序列化 {field_name} 失败: {e}")))
    }
}
