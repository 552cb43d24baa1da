use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use super::AppState;
use crate::error::AppError;
use crate::models::{Document, Page, Report};

/// `GET /mindmaps` 的查询参数
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub page_token: Option<String>,
}

/// `POST /mindmaps/generate` 的请求体，两个字段都可省略
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GenerateRequest {
    pub input_path: Option<String>,
    pub output_path: Option<String>,
}

/// 接口错误，统一渲染为 `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::Validation(_) | AppError::FileSystem { .. } | AppError::Parse { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::ExternalApi { .. } => StatusCode::BAD_GATEWAY,
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Storage(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("接口处理失败: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_mindmaps(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Document>>, ApiError> {
    if query.limit == Some(0) {
        return Err(AppError::validation("分页参数无效", "limit: 必须大于 0").into());
    }

    let page = state
        .processor
        .get_all_mind_maps(query.page_token.as_deref(), query.limit)
        .await?;
    Ok(Json(page))
}

/// 执行一次批处理
///
/// 最终结果文件写入失败时返回 500，响应体里仍带着完整报告
pub async fn generate_mindmaps(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: GenerateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        GenerateRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::validation("请求体无效", e.to_string()))?
    };

    let config = &state.config;
    let input_path = request.input_path.unwrap_or_else(|| config.input_path.clone());
    let output_path = request.output_path.unwrap_or_else(|| config.output_path.clone());
    info!("📥 收到生成请求: {} → {}", input_path, output_path);

    let run = state
        .processor
        .run_batch(&input_path, &output_path, config.max_concurrent, config.batch_size)
        .await?;

    match run.final_write {
        Ok(()) => Ok(Json(run.report).into_response()),
        Err(e) => {
            error!("❌ 报告已生成但写入 {} 失败: {}", output_path, e);
            Ok(write_failure_response(&e, run.report))
        }
    }
}

fn write_failure_response(err: &AppError, report: Report) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err.to_string(), "report": report })),
    )
        .into_response()
}
