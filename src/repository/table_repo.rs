//! 通用表操作的数据访问
//! 每次调用从连接池获取一个连接，执行一条语句后归还

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{
    pool::PoolConnection,
    postgres::{PgArguments, PgRow},
    query::Query,
    Column, PgPool, Postgres, Row, TypeInfo,
};
use uuid::Uuid;

use super::{ExecError, ResultSet, StatementExecutor};
use crate::{
    db::{self, HealthStatus},
    statement::{ColumnTypes, SqlValue, Statement},
};

pub struct PgStatementExecutor {
    db: PgPool,
}

impl PgStatementExecutor {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn acquire(&self) -> Result<PoolConnection<Postgres>, ExecError> {
        self.db.acquire().await.map_err(|e| {
            tracing::error!("Failed to acquire database connection: {}", e);
            ExecError::Acquire(e.to_string())
        })
    }
}

#[async_trait]
impl StatementExecutor for PgStatementExecutor {
    async fn fetch_all(&self, statement: &Statement) -> Result<ResultSet, ExecError> {
        let mut conn = self.acquire().await?;
        let rows = bind_params(statement).fetch_all(&mut *conn).await?;

        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let rows = rows
            .iter()
            .map(row_values)
            .collect::<Result<Vec<Vec<Value>>, ExecError>>()?;

        Ok(ResultSet { columns, rows })
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, ExecError> {
        let mut conn = self.acquire().await?;
        let result = bind_params(statement).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    async fn column_types(&self, table: &str) -> Result<ColumnTypes, ExecError> {
        let mut conn = self.acquire().await?;
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT a.attname::text, format_type(a.atttypid, NULL)
            FROM pg_catalog.pg_attribute a
            WHERE a.attrelid = to_regclass($1) AND a.attnum > 0 AND NOT a.attisdropped
            "#,
        )
        .bind(table)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn ping(&self) -> HealthStatus {
        db::health_check(&self.db).await
    }
}

/// 按顺序绑定全部参数，语句文本中不出现任何值
fn bind_params(statement: &Statement) -> Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(&statement.sql);
    for param in &statement.params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.as_str()),
        };
    }
    query
}

/// 可解码的列类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Date,
    Time,
    Timestamp,
    Timestamptz,
    Uuid,
    Json,
    Text,
    Bytes,
    TextArray,
    Int4Array,
    Int8Array,
}

/// 按驱动给出的类型名分类
fn column_kind(type_name: &str) -> Option<ColumnKind> {
    let kind = match type_name {
        "BOOL" => ColumnKind::Bool,
        "INT2" => ColumnKind::Int2,
        "INT4" => ColumnKind::Int4,
        "INT8" => ColumnKind::Int8,
        "FLOAT4" => ColumnKind::Float4,
        "FLOAT8" => ColumnKind::Float8,
        "NUMERIC" => ColumnKind::Numeric,
        "DATE" => ColumnKind::Date,
        "TIME" => ColumnKind::Time,
        "TIMESTAMP" => ColumnKind::Timestamp,
        "TIMESTAMPTZ" => ColumnKind::Timestamptz,
        "UUID" => ColumnKind::Uuid,
        "JSON" | "JSONB" => ColumnKind::Json,
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => ColumnKind::Text,
        "BYTEA" => ColumnKind::Bytes,
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => ColumnKind::TextArray,
        "INT4[]" => ColumnKind::Int4Array,
        "INT8[]" => ColumnKind::Int8Array,
        _ => return None,
    };
    Some(kind)
}

fn row_values(row: &PgRow) -> Result<Vec<Value>, ExecError> {
    row.columns()
        .iter()
        .map(|column| decode_value(row, column.ordinal(), column.name(), column.type_info().name()))
        .collect()
}

fn decode<'r, T>(row: &'r PgRow, index: usize) -> Result<Option<T>, ExecError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    Ok(row.try_get::<Option<T>, _>(index)?)
}

fn string(value: impl ToString) -> Value {
    Value::String(value.to_string())
}

/// 根据列类型元数据把单元格转换为 JSON，无法识别的类型返回错误而不是 null
fn decode_value(row: &PgRow, index: usize, name: &str, type_name: &str) -> Result<Value, ExecError> {
    let kind = column_kind(type_name).ok_or_else(|| {
        tracing::warn!(column = name, type_name, "Unsupported column type");
        ExecError::UnsupportedType {
            column: name.to_string(),
            type_name: type_name.to_string(),
        }
    })?;

    let value = match kind {
        ColumnKind::Bool => decode::<bool>(row, index)?.map(Value::from),
        ColumnKind::Int2 => decode::<i16>(row, index)?.map(Value::from),
        ColumnKind::Int4 => decode::<i32>(row, index)?.map(Value::from),
        ColumnKind::Int8 => decode::<i64>(row, index)?.map(Value::from),
        ColumnKind::Float4 => decode::<f32>(row, index)?.map(Value::from),
        ColumnKind::Float8 => decode::<f64>(row, index)?.map(Value::from),
        // 十进制按字符串返回以保留精度
        ColumnKind::Numeric => decode::<Decimal>(row, index)?.map(string),
        ColumnKind::Date => decode::<NaiveDate>(row, index)?.map(string),
        ColumnKind::Time => decode::<NaiveTime>(row, index)?.map(string),
        ColumnKind::Timestamp => decode::<NaiveDateTime>(row, index)?.map(string),
        ColumnKind::Timestamptz => {
            decode::<DateTime<Utc>>(row, index)?.map(|t| Value::String(t.to_rfc3339()))
        }
        ColumnKind::Uuid => decode::<Uuid>(row, index)?.map(string),
        ColumnKind::Json => decode::<Value>(row, index)?,
        ColumnKind::Text => decode::<String>(row, index)?.map(Value::String),
        ColumnKind::Bytes => {
            decode::<Vec<u8>>(row, index)?.map(|b| Value::String(format!("\\x{}", hex::encode(b))))
        }
        ColumnKind::TextArray => decode::<Vec<Option<String>>>(row, index)?.map(Value::from),
        ColumnKind::Int4Array => decode::<Vec<Option<i32>>>(row, index)?.map(Value::from),
        ColumnKind::Int8Array => decode::<Vec<Option<i64>>>(row, index)?.map(Value::from),
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_types_are_decodable() {
        let cases = [
            ("BOOL", ColumnKind::Bool),
            ("INT4", ColumnKind::Int4),
            ("INT8", ColumnKind::Int8),
            ("FLOAT8", ColumnKind::Float8),
            ("NUMERIC", ColumnKind::Numeric),
            ("DATE", ColumnKind::Date),
            ("TIME", ColumnKind::Time),
            ("TIMESTAMP", ColumnKind::Timestamp),
            ("TIMESTAMPTZ", ColumnKind::Timestamptz),
            ("UUID", ColumnKind::Uuid),
            ("JSONB", ColumnKind::Json),
            ("VARCHAR", ColumnKind::Text),
            ("BPCHAR", ColumnKind::Text),
            ("BPCHAR[]", ColumnKind::TextArray),
            ("INT4[]", ColumnKind::Int4Array),
            ("BYTEA", ColumnKind::Bytes),
        ];

        for (type_name, expected) in cases {
            assert_eq!(column_kind(type_name), Some(expected), "{}", type_name);
        }
    }

    #[test]
    fn test_unknown_types_are_not_silently_nulled() {
        for type_name in ["INTERVAL", "TIMETZ", "MONEY", "INET", "mood", ""] {
            assert_eq!(column_kind(type_name), None, "{}", type_name);
        }
    }

    #[test]
    fn test_unsupported_type_error_names_column() {
        let err = ExecError::UnsupportedType {
            column: "duration".to_string(),
            type_name: "INTERVAL".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported column type INTERVAL for column duration");
    }
}
