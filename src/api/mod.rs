//! API 模块
//!
//! 对外的 HTTP 接口，只做路由、参数校验、鉴权和委托：
//! - `GET  /health`：公开
//! - `GET  /mindmaps?limit&pageToken`：分页列出
//! - `POST /mindmaps/generate`：执行一次批处理，返回报告

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::config::Config;
use crate::orchestrator::BatchProcessor;

/// HTTP 处理函数共享的状态
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<BatchProcessor>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(processor: Arc<BatchProcessor>, config: Config) -> Self {
        Self {
            processor,
            config: Arc::new(config),
        }
    }
}

/// 构建路由
pub fn build_router(state: AppState) -> Router {
    // 需要鉴权的接口
    let protected = Router::new()
        .route("/mindmaps", get(handlers::list_mindmaps))
        .route("/mindmaps/generate", post(handlers::generate_mindmaps))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    // 公开接口
    let public = Router::new().route("/health", get(handlers::health));

    Router::new()
        .merge(protected)
        .merge(public)
        .with_state(state)
}
