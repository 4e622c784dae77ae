//! Bearer 令牌提取
//! 所有受保护端点统一使用 `Authorization: Bearer <token>` 约定

use crate::error::AppError;
use axum::{extract::FromRequestParts, http::HeaderMap};

/// 请求携带的原始令牌（尚未验证）
///
/// 验证由 [`crate::auth::TokenService::verify`] 完成。
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

// 实现 FromRequestParts 以便在 handler 中直接提取令牌
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        extract_token(&parts.headers)
            .map(|token| BearerToken(token.to_string()))
            .ok_or(AppError::InvalidAccess)
    }
}

/// 从 Authorization 头提取令牌
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
