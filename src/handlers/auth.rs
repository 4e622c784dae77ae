//! 认证相关的 HTTP 处理器

use super::json_body;
use crate::{
    auth::BearerToken,
    error::AppError,
    middleware::AppState,
    models::auth::{LoginRequest, LoginResponse},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req: LoginRequest = json_body(body)?;

    let token = state
        .auth_service
        .login(req.username.as_deref(), req.password.as_deref())
        .await?;

    Ok(Json(LoginResponse {
        message: "Login successful!".to_string(),
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.auth_service.token_lifetime_secs(),
    }))
}

/// 令牌校验端点
pub async fn protected(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> Result<impl IntoResponse, AppError> {
    let subject = state.token_service.verify(&token)?;

    Ok(Json(json!({
        "message": "Protected route accessed",
        "subject": subject,
    })))
}
