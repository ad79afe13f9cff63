// ==========================================
// 工单系统 - HTTP 路由
// ==========================================
// 职责: 组装所有路由与中间件（CORS、请求追踪、上传大小上限）
// ==========================================

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app::handlers;
use crate::app::state::AppState;

/// 上传请求体上限（字节）
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// 构建完整的应用路由
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/admin/legacy-import", post(handlers::legacy_import))
        .route(
            "/api/admin/legacy-import/body",
            get(handlers::body_stats).post(handlers::body_import),
        )
        .route(
            "/api/admin/legacy-import/delete",
            get(handlers::cohort_counts).delete(handlers::reverse_cohort),
        )
        .route(
            "/api/warehouses/{id}/stock/import",
            post(handlers::stock_import),
        )
        .route(
            "/api/warehouses/{id}/stock/check-conflicts",
            post(handlers::check_conflicts),
        )
        .route("/api/materials/import", post(handlers::material_import))
        .route("/api/nodes/import", post(handlers::node_import))
        .route("/api/import/preview", post(handlers::preview))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
