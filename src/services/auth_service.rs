//! 认证服务：校验凭据并签发会话令牌

use std::sync::Arc;

use crate::{
    auth::{jwt::TokenService, password::PasswordHasher, AuthError},
    repository::CredentialStore,
};

pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        tokens: Arc<TokenService>,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            credentials,
            tokens,
            hasher,
        }
    }

    /// 用户登录
    ///
    /// 每次调用只尝试一次：字段校验 → 查找凭据 → 校验密码 → 签发令牌。
    pub async fn login(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<String, AuthError> {
        let (username, password) = match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
            _ => return Err(AuthError::MissingFields),
        };

        let stored_hash = self
            .credentials
            .find_password_hash(username)
            .await
            .map_err(|e| {
                tracing::error!("Credential lookup failed: {}", e);
                AuthError::Backend
            })?
            .ok_or_else(|| {
                tracing::debug!(%username, "Login for unknown user");
                AuthError::UserNotFound
            })?;

        if !self.verify_password(password, stored_hash).await? {
            tracing::info!(%username, "Login rejected: invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.tokens.issue(username).map_err(|e| {
            tracing::error!("Token issuance failed: {}", e);
            AuthError::Backend
        })?;

        tracing::info!(%username, "Login successful");
        Ok(token)
    }

    /// 令牌有效期（秒）
    pub fn token_lifetime_secs(&self) -> u64 {
        self.tokens.expires_in()
    }

    /// Argon2 校验是 CPU 密集操作，放到阻塞线程池执行
    async fn verify_password(&self, password: &str, stored_hash: String) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
            .await
            .map_err(|e| {
                tracing::error!("Password verification task failed: {}", e);
                AuthError::Backend
            })
    }
}
