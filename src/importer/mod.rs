// ==========================================
// 工单系统 - 导入层
// ==========================================
// 流程: 文件解析 -> 列映射/校验 -> (冲突检测) -> 批次提交 -> 进度推送
// 支持: TSV, CSV, Excel
// ==========================================

pub mod batch_committer;
pub mod cohort;
pub mod column_mapper;
pub mod conflict_detector;
pub mod data_cleaner;
pub mod error;
pub mod file_parser;
pub mod frame_decoder;
pub mod processors;
pub mod progress;
pub mod row_processor;
pub mod stage_mapper;

// 重导出核心类型
pub use batch_committer::{BatchCommitter, BatchReport, RowLog};
pub use cohort::CohortReverser;
pub use column_mapper::{
    BodyColumnMapping, ColumnMapping, CommentColumnMapping, FileColumnMapping,
    MaterialCatalogColumnMapping, NodeColumnMapping, OrderColumnMapping, StockColumnMapping,
    UserColumnMapping,
};
pub use conflict_detector::ConflictDetector;
pub use data_cleaner::DataCleaner;
pub use error::{ImportError, ImportResult};
pub use file_parser::{RawRecord, TabularFile, TabularFormat};
pub use frame_decoder::{encode_frame, FrameDecoder};
pub use progress::{plan_job, FrameSink, ImportSource, ProgressStreamer, RunStatus};
pub use row_processor::{JobContext, RowOutcome, RowProcessor};
pub use stage_mapper::{StageMappingRule, StageTable, UnmappedStage};
