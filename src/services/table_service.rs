//! 通用表操作服务
//! 令牌校验 → 白名单校验 → 必填字段 → 构建语句（按列类型转换参数）→ 执行 → 整理结果

use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    auth::jwt::TokenService,
    policy::TableAllowList,
    repository::{ResultSet, StatementExecutor},
    statement::{Operation, RowPayload, StatementBuilder, ValidationError},
};

/// 表操作错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Invalid access")]
    Unauthorized,

    #[error("Invalid table name")]
    InvalidTable,

    #[error("Missing required fields")]
    MissingFields,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Statement execution failed")]
    ExecutionFailed,
}

/// 操作结果
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutput {
    /// 查询结果，每行按列顺序映射列名到值
    Rows(Vec<Map<String, Value>>),
    /// 写操作确认
    Ack { rows_affected: u64 },
}

pub struct TableService {
    tokens: Arc<TokenService>,
    policy: Arc<TableAllowList>,
    builder: StatementBuilder,
    executor: Arc<dyn StatementExecutor>,
}

impl TableService {
    pub fn new(
        tokens: Arc<TokenService>,
        policy: Arc<TableAllowList>,
        builder: StatementBuilder,
        executor: Arc<dyn StatementExecutor>,
    ) -> Self {
        Self {
            tokens,
            policy,
            builder,
            executor,
        }
    }

    /// 执行一次表操作
    pub async fn execute(
        &self,
        operation: Operation,
        token: &str,
        table: Option<&str>,
        payload: Option<&RowPayload>,
    ) -> Result<GatewayOutput, GatewayError> {
        let subject = self.tokens.verify(token).map_err(|e| {
            tracing::debug!(%operation, "Rejected token: {}", e);
            GatewayError::Unauthorized
        })?;

        let table_name = table.filter(|t| !t.is_empty()).ok_or(GatewayError::MissingFields)?;
        let table = self.policy.resolve(table_name).ok_or_else(|| {
            tracing::warn!(%subject, %operation, table = %table_name, "Table not in allow-list");
            GatewayError::InvalidTable
        })?;

        if operation.requires_payload() && payload.is_none() {
            return Err(GatewayError::MissingFields);
        }

        // 先按无类型方式校验行数据，再读取列类型生成最终语句
        let mut statement = self.builder.build(operation, table, payload)?;
        if operation.requires_payload() {
            let column_types = self.executor.column_types(table.name()).await.map_err(|e| {
                tracing::error!(table = %table.name(), "Column type lookup failed: {}", e);
                GatewayError::ExecutionFailed
            })?;
            if !column_types.is_empty() {
                statement = self
                    .builder
                    .clone()
                    .with_column_types(column_types)
                    .build(operation, table, payload)?;
            }
        }

        tracing::info!(
            %subject,
            %operation,
            table = %statement.table,
            columns = ?statement.columns,
            "Executing table operation"
        );

        match operation {
            Operation::Select => {
                let result = self.executor.fetch_all(&statement).await.map_err(|e| {
                    tracing::error!(table = %statement.table, "Select failed: {}", e);
                    GatewayError::ExecutionFailed
                })?;
                Ok(GatewayOutput::Rows(shape_rows(result)))
            }
            _ => {
                let rows_affected = self.executor.execute(&statement).await.map_err(|e| {
                    tracing::error!(table = %statement.table, %operation, "Write failed: {}", e);
                    GatewayError::ExecutionFailed
                })?;
                Ok(GatewayOutput::Ack { rows_affected })
            }
        }
    }
}

/// 按列元数据把每一行整理成有序的列名→值映射
pub fn shape_rows(result: ResultSet) -> Vec<Map<String, Value>> {
    let ResultSet { columns, rows } = result;
    rows.into_iter()
        .map(|row| columns.iter().cloned().zip(row).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shape_rows_preserves_column_order() {
        let result = ResultSet {
            columns: vec!["zeta".to_string(), "alpha".to_string(), "mid".to_string()],
            rows: vec![
                vec![json!(1), json!("a"), Value::Null],
                vec![json!(2), json!("b"), json!(true)],
            ],
        };

        let rows = shape_rows(result);
        assert_eq!(rows.len(), 2);

        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(rows[1]["mid"], json!(true));
    }

    #[test]
    fn test_shape_rows_empty() {
        assert!(shape_rows(ResultSet::default()).is_empty());
    }
}
