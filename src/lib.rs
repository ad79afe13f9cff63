// ==========================================
// 工单系统 - 表格批量导入与对账引擎
// ==========================================
// 技术栈: axum + Rust + SQLite
// 定位: 把旧系统导出/仓库库存表合并进现有数据，实时推送进度，可按导入批次整体回滚
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "ru");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 解析/映射/提交/进度/回滚
pub mod importer;

// 配置层 - 启动配置与导入参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建库）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - HTTP 集成
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    CohortCategory, ConflictPolicy, LogLevel, OrderStatus, Phase, SourceType, Urgency,
};

// 领域实体
pub use domain::{EntityStats, ImportJob, LogEntry, ProgressFrame, ReverseReport};

// 导入引擎
pub use importer::{
    CohortReverser, ConflictDetector, FrameDecoder, ProgressStreamer, StageTable, TabularFile,
};

// API
pub use api::{CohortApi, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "zakaz-import";
