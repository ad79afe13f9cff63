// ==========================================
// 工单系统 - 行处理器接口
// ==========================================
// 职责: 定义单行记录 -> 持久化结果 的统一接口
// 实现者: importer::processors 下各来源的处理器
// 红线: 处理器只在调用方提供的保存点内写库，不自行开启事务
// ==========================================

use crate::domain::import_job::EntityStats;
use crate::domain::records::Provenance;
use crate::domain::types::SourceType;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::RawRecord;
use rusqlite::Connection;

/// 单行处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// 新增
    Imported,
    /// 已存在且有字段变化
    Updated,
    /// 已存在且无变化（计入 skipped，不产生日志）
    Unchanged,
    /// 校验不通过（计入 skipped，附带原因）
    Skipped(String),
    /// 行级业务错误（计入 errors，附带原因）
    Failed(String),
}

impl RowOutcome {
    /// 计入统计
    pub fn record(&self, stats: &mut EntityStats) {
        match self {
            RowOutcome::Imported => stats.record_imported(),
            RowOutcome::Updated => stats.record_updated(),
            RowOutcome::Unchanged | RowOutcome::Skipped(_) => stats.record_skipped(),
            RowOutcome::Failed(_) => stats.record_errors(1),
        }
    }
}

/// 任务上下文（来源标记所需信息）
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: String,
}

impl JobContext {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }

    pub fn provenance(&self, source: SourceType) -> Provenance {
        Provenance {
            source: source.as_str().to_string(),
            job_id: self.job_id.clone(),
        }
    }
}

// ==========================================
// RowProcessor Trait
// ==========================================
pub trait RowProcessor: Send {
    /// 处理器对应的导入来源
    fn source_type(&self) -> SourceType;

    /// 处理一行
    ///
    /// # 返回
    /// - Ok(outcome): 行级结果（含校验失败）
    /// - Err: 持久化失败，由批次提交器回滚该行保存点并计入 errors
    fn process(
        &mut self,
        conn: &Connection,
        record: &RawRecord,
        ctx: &JobContext,
    ) -> ImportResult<RowOutcome>;
}
