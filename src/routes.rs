//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer};

use crate::{handlers, middleware::AppState};

/// 请求体上限（1 MiB）
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 登录无需令牌
    let auth_routes = Router::new().route("/login", post(handlers::auth::login));

    // 需要 Bearer 令牌的路由，令牌由各处理器校验
    let table_routes = Router::new()
        .route("/protected", get(handlers::auth::protected))
        .route("/select", get(handlers::table::select))
        .route("/insert", post(handlers::table::insert))
        .route("/update", post(handlers::table::update))
        .route("/delete", delete(handlers::table::delete));

    // 组合所有路由
    Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(table_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(axum::middleware::from_fn(crate::middleware::request_tracking_middleware))
        .with_state(state)
}
