// ==========================================
// 工单系统 - 应用层
// ==========================================
// 职责: HTTP 集成（axum），连接调用方与导入引擎
// ==========================================

pub mod form;
pub mod handlers;
pub mod router;
pub mod state;

// 重导出
pub use router::build_router;
pub use state::AppState;
