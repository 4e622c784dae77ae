//! 通用表操作的 HTTP 处理器

use super::json_body;
use crate::{
    auth::BearerToken,
    error::AppError,
    middleware::AppState,
    models::table::{SelectQuery, TableWriteRequest, WriteAck},
    services::GatewayOutput,
    statement::Operation,
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

/// 查询整张表
pub async fn select(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    query: Result<Query<SelectQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query?;
    let output = state
        .table_service
        .execute(Operation::Select, &token, query.name.as_deref(), None)
        .await?;

    Ok(respond(output, StatusCode::OK, "Rows fetched successfully"))
}

/// 插入一行
pub async fn insert(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    body: Result<Json<TableWriteRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    write(&state, Operation::Insert, &token, body, StatusCode::CREATED, "Data inserted successfully").await
}

/// 按主键更新一行
pub async fn update(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    body: Result<Json<TableWriteRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    write(&state, Operation::Update, &token, body, StatusCode::CREATED, "Data updated successfully").await
}

/// 按主键删除一行
pub async fn delete(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
    body: Result<Json<TableWriteRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    write(&state, Operation::Delete, &token, body, StatusCode::OK, "Data deleted successfully").await
}

async fn write(
    state: &AppState,
    operation: Operation,
    token: &str,
    body: Result<Json<TableWriteRequest>, JsonRejection>,
    status: StatusCode,
    message: &str,
) -> Result<Response, AppError> {
    let req: TableWriteRequest = match json_body(body) {
        Ok(req) => req,
        Err(rejection) => {
            // 令牌错误优先于请求体错误
            state.token_service.verify(token)?;
            return Err(rejection);
        }
    };

    let output = state
        .table_service
        .execute(operation, token, req.name.as_deref(), req.data.as_ref())
        .await?;

    Ok(respond(output, status, message))
}

fn respond(output: GatewayOutput, status: StatusCode, message: &str) -> Response {
    match output {
        GatewayOutput::Rows(rows) => (status, Json(rows)).into_response(),
        GatewayOutput::Ack { rows_affected } => (
            status,
            Json(WriteAck {
                message: message.to_string(),
                rows_affected,
            }),
        )
            .into_response(),
    }
}
