//! Database repository layer
//!
//! 数据库被视为参数化语句的执行器，服务层只依赖这里的 trait。

pub mod credential_repo;
pub mod table_repo;

pub use credential_repo::PgCredentialStore;
pub use table_repo::PgStatementExecutor;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::{
    db::HealthStatus,
    statement::{ColumnTypes, Statement},
};

/// 执行器错误（不会原样返回给客户端）
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Failed to acquire connection: {0}")]
    Acquire(String),

    #[error("Statement failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Unsupported column type {type_name} for column {column}")]
    UnsupportedType { column: String, type_name: String },
}

/// 查询结果：列元数据与按列顺序排列的值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// 凭据查询
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 返回用户名对应的密码摘要，用户不存在时返回 None
    async fn find_password_hash(&self, username: &str) -> Result<Option<String>, ExecError>;
}

/// 参数化语句执行
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// 执行查询语句并返回结果集
    async fn fetch_all(&self, statement: &Statement) -> Result<ResultSet, ExecError>;

    /// 执行写语句并返回受影响行数
    async fn execute(&self, statement: &Statement) -> Result<u64, ExecError>;

    /// 目标表的列类型，用于给绑定参数加上显式类型转换
    async fn column_types(&self, _table: &str) -> Result<ColumnTypes, ExecError> {
        Ok(ColumnTypes::new())
    }

    /// 就绪检查
    async fn ping(&self) -> HealthStatus;
}
