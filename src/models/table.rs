//! 通用表操作请求与响应

use serde::{Deserialize, Serialize};

use crate::statement::RowPayload;

/// GET /select 查询参数
#[derive(Debug, Default, Deserialize)]
pub struct SelectQuery {
    pub name: Option<String>,
}

/// 写操作请求体
#[derive(Debug, Default, Deserialize)]
pub struct TableWriteRequest {
    pub name: Option<String>,
    pub data: Option<RowPayload>,
}

/// 写操作确认
#[derive(Debug, Serialize)]
pub struct WriteAck {
    pub message: String,
    pub rows_affected: u64,
}
