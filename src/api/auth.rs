//! 鉴权中间件
//!
//! 请求头 `x-api-key` 必须与配置的共享密钥一致，比较耗时与内容无关

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use super::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let expected = state.config.api_key.as_bytes();

    // 未配置密钥时不做校验
    if expected.is_empty() {
        return next.run(request).await;
    }

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .map(|v| v.as_bytes())
        .unwrap_or_default();

    if constant_time_eq(provided, expected) {
        next.run(request).await
    } else {
        warn!("🔒 拒绝未授权请求: {} {}", request.method(), request.uri().path());
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "未授权：API key 无效" })),
        )
            .into_response()
    }
}

/// 等长时逐字节比较全部内容，不提前返回
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
