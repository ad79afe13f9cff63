// ==========================================
// 工单系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供 HTTP 路由调用
// ==========================================

pub mod cohort_api;
pub mod error;
pub mod import_api;

// 重导出核心类型
pub use cohort_api::{CohortApi, CohortCounts};
pub use error::{ApiError, ApiResult};
pub use import_api::{
    BodyImportRequest, ConflictCheckRequest, ImportApi, ImportStream, LegacyImportRequest,
    MaterialImportRequest, NodeImportRequest, PreviewResponse, StockImportRequest, UploadedFile,
};
