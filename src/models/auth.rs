//! Authentication-related models

use serde::{Deserialize, Serialize};

/// Login request
///
/// 字段可缺省，缺失时由服务层返回 400 而不是反序列化失败。
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
}
