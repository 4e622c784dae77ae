//! Credential repository (凭据数据访问)

use async_trait::async_trait;
use sqlx::PgPool;

use super::{CredentialStore, ExecError};

pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    /// 根据用户名查找密码摘要
    async fn find_password_hash(&self, username: &str) -> Result<Option<String>, ExecError> {
        // 单次请求独占一个连接，离开作用域时归还连接池
        let mut conn = self
            .db
            .acquire()
            .await
            .map_err(|e| ExecError::Acquire(e.to_string()))?;

        let hash = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(hash)
    }
}
