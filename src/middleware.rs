//! HTTP 中间件与共享状态
//! 请求追踪（trace_id / request_id / 指标）

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    auth::{PasswordHasher, TokenService},
    config::AppConfig,
    error::AppError,
    policy::TableAllowList,
    repository::{CredentialStore, StatementExecutor},
    services::{AuthService, TableService},
    statement::StatementBuilder,
};

/// 应用状态
///
/// 白名单与签名密钥在启动时加载，之后只读共享；
/// 连接由执行器按请求获取和归还，状态中不持有任何连接。
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub table_service: Arc<TableService>,
    pub token_service: Arc<TokenService>,
    pub executor: Arc<dyn StatementExecutor>,
}

impl AppState {
    /// 根据配置组装所有服务
    pub fn new(
        config: &AppConfig,
        credentials: Arc<dyn CredentialStore>,
        executor: Arc<dyn StatementExecutor>,
    ) -> Result<Self, AppError> {
        let token_service = Arc::new(TokenService::from_config(&config.security)?);
        let allow_list = Arc::new(TableAllowList::from_config(&config.tables)?);
        let builder = StatementBuilder::new(config.tables.date_column_names());
        let hasher =
            PasswordHasher::new().accept_legacy_digests(config.security.accept_legacy_digests);

        let auth_service = Arc::new(AuthService::new(credentials, token_service.clone(), hasher));
        let table_service = Arc::new(TableService::new(
            token_service.clone(),
            allow_list,
            builder,
            executor.clone(),
        ));

        Ok(Self {
            auth_service,
            table_service,
            token_service,
            executor,
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    // 只记录路径，查询参数可能包含业务数据
    let path = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        // 指标标签使用静态字符串
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "DELETE" => "DELETE",
            _ => "OTHER",
        };
        let status_code = match status {
            200 => "200",
            201 => "201",
            400 => "400",
            401 => "401",
            404 => "404",
            500 => "500",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_code)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            path = %path,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
