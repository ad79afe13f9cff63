// ==========================================
// 工单系统 - HTTP 处理函数
// ==========================================
// 职责: 请求 -> API 调用 -> 响应（JSON 或进度事件流）
// 说明: 业务校验全部在 API 层，这里只做参数提取
// ==========================================

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;

use crate::api::{
    ApiError, ApiResult, BodyImportRequest, ConflictCheckRequest, ImportStream, LegacyImportRequest,
    MaterialImportRequest, NodeImportRequest, StockImportRequest,
};
use crate::app::form::MultipartForm;
use crate::app::state::AppState;
use crate::domain::records::ReverseReport;
use crate::importer::ImportError;

/// 响应头: 本次导入的任务 ID
pub const JOB_ID_HEADER: HeaderName = HeaderName::from_static("x-import-job-id");

/// 进度帧 -> 事件流响应（每帧 `data: <json>\n\n`）
fn event_stream(stream: ImportStream) -> Response {
    let ImportStream { job_id, frames, .. } = stream;
    let events = ReceiverStream::new(frames).map(|frame| Event::default().json_data(frame));

    let mut response = Sse::new(events).into_response();
    if let Ok(value) = HeaderValue::from_str(&job_id) {
        response.headers_mut().insert(JOB_ID_HEADER, value);
    }
    response
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /api/admin/legacy-import
pub async fn legacy_import(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let mut form = MultipartForm::read(multipart).await?;
    let req = LegacyImportRequest {
        orders: form.take_file("orders"),
        comments: form.take_file("comments"),
        files: form.take_file("files"),
        users: form.take_file("users"),
        batch_size: form.usize_field("batchSize")?,
        record_limit: form.usize_field("recordLimit")?,
    };

    let stream = state.import_api.start_legacy_import(req).await?;
    Ok(event_stream(stream))
}

/// POST /api/admin/legacy-import/body
pub async fn body_import(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let mut form = MultipartForm::read(multipart).await?;
    let req = BodyImportRequest {
        body: form.take_file("body"),
        column_mapping: form.text_owned("columnMapping"),
        batch_size: form.usize_field("batchSize")?,
        record_limit: form.usize_field("recordLimit")?,
    };

    let stream = state.import_api.start_body_import(req).await?;
    Ok(event_stream(stream))
}

/// GET /api/admin/legacy-import/body
pub async fn body_stats(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.import_api.body_counts()?))
}

/// POST /api/warehouses/{id}/stock/import
pub async fn stock_import(
    State(state): State<Arc<AppState>>,
    Path(warehouse_id): Path<String>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let mut form = MultipartForm::read(multipart).await?;
    let req = StockImportRequest {
        warehouse_id,
        file: form.take_file("file"),
        column_mapping: form.text_owned("columnMapping"),
        conflict_resolution: form.conflict_policy()?,
        update_names: form.update_names()?,
        no_headers: form.bool_field("noHeaders"),
        batch_size: form.usize_field("batchSize")?,
        record_limit: form.usize_field("recordLimit")?,
    };

    let stream = state.import_api.start_stock_import(req).await?;
    Ok(event_stream(stream))
}

/// POST /api/materials/import
pub async fn material_import(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let mut form = MultipartForm::read(multipart).await?;
    let req = MaterialImportRequest {
        file: form.take_file("file"),
        column_mapping: form.text_owned("columnMapping"),
        no_headers: form.bool_field("noHeaders"),
        batch_size: form.usize_field("batchSize")?,
        record_limit: form.usize_field("recordLimit")?,
    };

    let stream = state.import_api.start_material_import(req).await?;
    Ok(event_stream(stream))
}

/// POST /api/nodes/import
pub async fn node_import(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let mut form = MultipartForm::read(multipart).await?;
    let req = NodeImportRequest {
        file: form.take_file("file"),
        column_mapping: form.text_owned("columnMapping"),
        batch_size: form.usize_field("batchSize")?,
        record_limit: form.usize_field("recordLimit")?,
    };

    let stream = state.import_api.start_node_import(req).await?;
    Ok(event_stream(stream))
}

/// POST /api/warehouses/{id}/stock/check-conflicts
pub async fn check_conflicts(
    State(state): State<Arc<AppState>>,
    Path(warehouse_id): Path<String>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut form = MultipartForm::read(multipart).await?;
    let req = ConflictCheckRequest {
        warehouse_id,
        file: form.take_file("file"),
        column_mapping: form.text_owned("columnMapping"),
        no_headers: form.bool_field("noHeaders"),
    };

    let api = state.import_api.clone();
    let report = tokio::task::spawn_blocking(move || api.check_conflicts(req))
        .await
        .map_err(|e| ApiError::InternalError(format!("冲突检测任务异常退出: {}", e)))??;
    Ok(Json(report))
}

/// POST /api/import/preview
pub async fn preview(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut form = MultipartForm::read(multipart).await?;
    let no_headers = form.bool_field("noHeaders");
    let file = form
        .take_file("file")
        .ok_or_else(|| ImportError::FileNotProvided("file".to_string()))?;

    Ok(Json(state.import_api.preview(file, no_headers)?))
}

/// 回滚响应: {success, deleted, error?}
#[derive(Debug, Serialize)]
struct ReverseResponse {
    success: bool,
    #[serde(flatten)]
    report: ReverseReport,
}

#[derive(Debug, Deserialize)]
pub struct CohortQuery {
    #[serde(rename = "type")]
    pub category: Option<String>,
}

/// DELETE /api/admin/legacy-import/delete?type=<category>
///
/// 部分失败时返回 500，响应体仍包含已删除的计数
pub async fn reverse_cohort(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CohortQuery>,
) -> ApiResult<Response> {
    let category = query
        .category
        .as_deref()
        .ok_or_else(|| ApiError::InvalidInput("缺少参数 type".to_string()))?;

    let report = state.cohort_api.reverse(category).await?;
    let status = if report.is_complete() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let body = ReverseResponse {
        success: report.is_complete(),
        report,
    };
    Ok((status, Json(body)).into_response())
}

/// GET /api/admin/legacy-import/delete
pub async fn cohort_counts(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.cohort_api.counts().await?))
}
