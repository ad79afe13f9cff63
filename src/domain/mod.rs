// ==========================================
// 工单系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod import_job;
pub mod records;
pub mod types;

// 重导出核心类型
pub use import_job::{EntityStats, ImportJob, LogEntry, ProgressFrame, StatsSnapshot};
pub use records::{
    ApplicationFields, CommentFields, ConflictEntry, ConflictReport, ExistingApplication,
    ExistingNode, ExistingUser, FileFields, MaterialRecord, NodeFields, Provenance, ReverseReport,
    StockRow, UserFields,
};
pub use types::{
    CohortCategory, ConflictPolicy, CustomerType, LogLevel, NodeStatus, OrderStatus, Phase,
    ServiceType, SourceType, Urgency,
};
