//! SQL 语句构建
//! 将 (表, 操作, 行数据) 转换为参数化语句，值一律通过绑定参数传递

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

use crate::policy::{is_valid_identifier, is_valid_type_name, AllowedTable};

/// 调用方提供的行数据，键顺序即列顺序
pub type RowPayload = Map<String, Value>;

/// 列名到数据库类型名的映射
pub type ColumnTypes = HashMap<String, String>;

/// 日期列的转换格式
pub const DATE_FORMAT: &str = "YYYY-MM-DD";

/// 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

impl Operation {
    /// 写操作需要行数据
    pub fn requires_payload(&self) -> bool {
        !matches!(self, Operation::Select)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Select => "SELECT",
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 绑定参数值
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    fn from_json(column: &str, value: &Value) -> Result<Self, ValidationError> {
        match value {
            Value::Null => Ok(SqlValue::Null),
            Value::Bool(b) => Ok(SqlValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(SqlValue::Int)
                .or_else(|| n.as_f64().map(SqlValue::Float))
                .ok_or_else(|| ValidationError::UnsupportedValue(column.to_string())),
            Value::String(s) => Ok(SqlValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => {
                Err(ValidationError::UnsupportedValue(column.to_string()))
            }
        }
    }
}

/// 行数据校验错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Payload must contain at least one column")]
    EmptyPayload,

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Unsupported value for column: {0}")]
    UnsupportedValue(String),

    #[error("Missing key column: {0}")]
    MissingKey(String),

    #[error("Key column must not be null: {0}")]
    NullKey(String),

    #[error("No columns to update")]
    NothingToUpdate,
}

/// 可执行的参数化语句
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub operation: Operation,
    pub table: String,
    pub columns: Vec<String>,
    pub params: Vec<SqlValue>,
    pub sql: String,
}

/// 语句构建器
///
/// 设置了列类型时，非日期列的占位符写成 `CAST($n AS <type>)`，
/// 字符串与 null 参数由数据库按列类型转换。
#[derive(Debug, Clone, Default)]
pub struct StatementBuilder {
    date_columns: HashSet<String>,
    column_types: ColumnTypes,
}

impl StatementBuilder {
    pub fn new<I, S>(date_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            date_columns: date_columns.into_iter().map(Into::into).collect(),
            column_types: ColumnTypes::new(),
        }
    }

    /// 附加目标表的列类型，类型名不合法的列保持不转换
    pub fn with_column_types(mut self, column_types: ColumnTypes) -> Self {
        self.column_types = column_types
            .into_iter()
            .filter(|(column, ty)| {
                let valid = is_valid_type_name(ty);
                if !valid {
                    tracing::warn!(column = %column, type_name = %ty, "Skipping cast for column type");
                }
                valid
            })
            .collect();
        self
    }

    /// 按操作类型构建语句
    pub fn build(
        &self,
        operation: Operation,
        table: AllowedTable<'_>,
        payload: Option<&RowPayload>,
    ) -> Result<Statement, ValidationError> {
        let empty = RowPayload::new();
        let payload = payload.unwrap_or(&empty);
        match operation {
            Operation::Select => Ok(self.select(table)),
            Operation::Insert => self.insert(table, payload),
            Operation::Update => self.update(table, payload),
            Operation::Delete => self.delete(table, payload),
        }
    }

    pub fn select(&self, table: AllowedTable<'_>) -> Statement {
        Statement {
            operation: Operation::Select,
            table: table.name().to_string(),
            columns: Vec::new(),
            params: Vec::new(),
            sql: format!("SELECT * FROM {}", table.name()),
        }
    }

    pub fn insert(
        &self,
        table: AllowedTable<'_>,
        payload: &RowPayload,
    ) -> Result<Statement, ValidationError> {
        let columns = self.collect_columns(payload)?;

        let mut params = Vec::with_capacity(columns.len());
        let mut placeholders = Vec::with_capacity(columns.len());
        for (column, value) in &columns {
            params.push(value.clone());
            placeholders.push(self.placeholder(column, params.len()));
        }

        let names: Vec<String> = columns.into_iter().map(|(c, _)| c.to_string()).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.name(),
            names.join(", "),
            placeholders.join(", ")
        );

        Ok(Statement {
            operation: Operation::Insert,
            table: table.name().to_string(),
            columns: names,
            params,
            sql,
        })
    }

    pub fn update(
        &self,
        table: AllowedTable<'_>,
        payload: &RowPayload,
    ) -> Result<Statement, ValidationError> {
        let columns = self.collect_columns(payload)?;
        let key = table.key_column();
        let key_value = Self::key_value(key, &columns)?;

        let mut params = Vec::with_capacity(columns.len());
        let mut assignments = Vec::new();
        let mut names = Vec::new();
        for (column, value) in columns.iter().filter(|(c, _)| *c != key) {
            params.push(value.clone());
            assignments.push(format!("{} = {}", column, self.placeholder(column, params.len())));
            names.push(column.to_string());
        }
        if assignments.is_empty() {
            return Err(ValidationError::NothingToUpdate);
        }

        params.push(key_value);
        names.push(key.to_string());
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            table.name(),
            assignments.join(", "),
            key,
            self.placeholder(key, params.len())
        );

        Ok(Statement {
            operation: Operation::Update,
            table: table.name().to_string(),
            columns: names,
            params,
            sql,
        })
    }

    /// 只按主键删除，其余列被忽略
    pub fn delete(
        &self,
        table: AllowedTable<'_>,
        payload: &RowPayload,
    ) -> Result<Statement, ValidationError> {
        let columns = self.collect_columns(payload)?;
        let key = table.key_column();
        let key_value = Self::key_value(key, &columns)?;

        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            table.name(),
            key,
            self.placeholder(key, 1)
        );

        Ok(Statement {
            operation: Operation::Delete,
            table: table.name().to_string(),
            columns: vec![key.to_string()],
            params: vec![key_value],
            sql,
        })
    }

    /// 校验列名与取值，保留调用方给出的顺序
    fn collect_columns<'p>(
        &self,
        payload: &'p RowPayload,
    ) -> Result<Vec<(&'p str, SqlValue)>, ValidationError> {
        if payload.is_empty() {
            return Err(ValidationError::EmptyPayload);
        }

        payload
            .iter()
            .map(|(column, value)| {
                if !is_valid_identifier(column) {
                    return Err(ValidationError::InvalidColumn(column.clone()));
                }
                Ok((column.as_str(), SqlValue::from_json(column, value)?))
            })
            .collect()
    }

    fn key_value(key: &str, columns: &[(&str, SqlValue)]) -> Result<SqlValue, ValidationError> {
        match columns.iter().find(|(c, _)| *c == key) {
            None => Err(ValidationError::MissingKey(key.to_string())),
            Some((_, SqlValue::Null)) => Err(ValidationError::NullKey(key.to_string())),
            Some((_, value)) => Ok(value.clone()),
        }
    }

    fn placeholder(&self, column: &str, index: usize) -> String {
        if self.date_columns.contains(column) {
            format!("TO_DATE(${}, '{}')", index, DATE_FORMAT)
        } else if let Some(ty) = self.column_types.get(column) {
            format!("CAST(${} AS {})", index, ty)
        } else {
            format!("${}", index)
        }
    }
}
