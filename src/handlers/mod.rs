//! HTTP 处理器模块

pub mod auth;
pub mod health;
pub mod table;

use crate::error::AppError;
use axum::{extract::rejection::JsonRejection, Json};

/// 取出 JSON 请求体
///
/// 没有请求体（未声明 JSON 内容类型）时返回默认值，交由服务层按缺少字段处理；
/// 其余提取错误（语法错误、类型不符、超出大小限制）保留各自的状态码。
pub(crate) fn json_body<T: Default>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(rejection.into()),
    }
}
