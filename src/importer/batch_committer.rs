// ==========================================
// 工单系统 - 批次提交器
// ==========================================
// 职责: 按 batch_size 切分记录流，逐批写库
// 事务模型:
// - 每批一个事务；批内每行一个保存点
// - 行处理返回 Err -> 回滚该行保存点，计入 errors，继续下一行
// - 批事务提交失败 -> 整批回滚，整批行数计入 errors
// 锁: 共享连接的互斥锁只在单批期间持有
// ==========================================

use crate::domain::import_job::{EntityStats, LogEntry};
use crate::i18n::{t, t_with_args};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawRecord;
use crate::importer::row_processor::{JobContext, RowOutcome, RowProcessor};
use rusqlite::Connection;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// 行级日志（批次提交后统一推送）
#[derive(Debug, Clone)]
pub struct RowLog {
    /// 批内偏移（该行之前已完成的行数）
    pub offset: usize,
    pub row_number: usize,
    pub entry: LogEntry,
}

/// 单批处理结果
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub rows: usize,
    pub delta: EntityStats,
    pub row_logs: Vec<RowLog>,
    pub committed: bool,
}

pub struct BatchCommitter {
    conn: Arc<Mutex<Connection>>,
    batch_size: usize,
}

impl BatchCommitter {
    pub fn new(conn: Arc<Mutex<Connection>>, batch_size: usize) -> Self {
        Self {
            conn,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 处理整个记录流
    ///
    /// # 参数
    /// - limit: 最多处理的源记录数（与批边界无关）
    /// - on_batch: 每批提交后回调；返回 Break 时在本批之后停止
    ///
    /// # 返回
    /// - 所有已处理批次的统计合计
    pub fn commit_all<P, I, F>(
        &self,
        processor: &mut P,
        records: I,
        limit: Option<usize>,
        ctx: &JobContext,
        mut on_batch: F,
    ) -> ImportResult<EntityStats>
    where
        P: RowProcessor + ?Sized,
        I: Iterator<Item = ImportResult<RawRecord>>,
        F: FnMut(&BatchReport) -> ControlFlow<()>,
    {
        let mut records = records.take(limit.unwrap_or(usize::MAX));
        let mut total = EntityStats::default();
        let mut batch_no = 0usize;

        loop {
            let mut batch = Vec::with_capacity(self.batch_size);
            for record in records.by_ref().take(self.batch_size) {
                batch.push(record?);
            }
            if batch.is_empty() {
                break;
            }

            batch_no += 1;
            let report = self.commit_batch(processor, &batch, ctx)?;
            total.merge(&report.delta);
            debug!(
                job_id = %ctx.job_id,
                source = %processor.source_type(),
                batch = batch_no,
                rows = report.rows,
                committed = report.committed,
                "批次处理完成"
            );

            if on_batch(&report).is_break() {
                break;
            }
        }

        Ok(total)
    }

    /// 处理单批
    fn commit_batch<P>(
        &self,
        processor: &mut P,
        batch: &[RawRecord],
        ctx: &JobContext,
    ) -> ImportResult<BatchReport>
    where
        P: RowProcessor + ?Sized,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| ImportError::LockError(e.to_string()))?;
        let mut tx = conn.transaction()?;

        let mut delta = EntityStats::default();
        let mut row_logs = Vec::new();

        for (offset, record) in batch.iter().enumerate() {
            let sp = tx.savepoint()?;
            match processor.process(&sp, record, ctx) {
                Ok(outcome) => {
                    sp.commit()?;
                    outcome.record(&mut delta);
                    let entry = match outcome {
                        RowOutcome::Skipped(reason) => {
                            Some(LogEntry::warning(row_message(record.row_number, &reason)))
                        }
                        RowOutcome::Failed(reason) => {
                            Some(LogEntry::error(row_message(record.row_number, &reason)))
                        }
                        _ => None,
                    };
                    if let Some(entry) = entry {
                        row_logs.push(RowLog {
                            offset,
                            row_number: record.row_number,
                            entry,
                        });
                    }
                }
                Err(e) => {
                    // 保存点 drop 时回滚
                    drop(sp);
                    warn!(
                        job_id = %ctx.job_id,
                        row_number = record.row_number,
                        error = %e,
                        "行写入失败"
                    );
                    delta.record_errors(1);
                    row_logs.push(RowLog {
                        offset,
                        row_number: record.row_number,
                        entry: LogEntry::error(row_message(
                            record.row_number,
                            &t("row.persist_failed"),
                        ))
                        .with_details(e.to_string()),
                    });
                }
            }
        }

        match tx.commit() {
            Ok(()) => Ok(BatchReport {
                rows: batch.len(),
                delta,
                row_logs,
                committed: true,
            }),
            Err(e) => {
                warn!(job_id = %ctx.job_id, rows = batch.len(), error = %e, "批次提交失败，整批回滚");
                let mut failed = EntityStats::default();
                failed.record_errors(batch.len() as u64);
                let first_row = batch.first().map(|r| r.row_number).unwrap_or_default();
                Ok(BatchReport {
                    rows: batch.len(),
                    delta: failed,
                    row_logs: vec![RowLog {
                        offset: 0,
                        row_number: first_row,
                        entry: LogEntry::error(t_with_args(
                            "batch.commit_failed",
                            &[("count", &batch.len().to_string())],
                        ))
                        .with_details(e.to_string()),
                    }],
                    committed: false,
                })
            }
        }
    }
}

fn row_message(row_number: usize, reason: &str) -> String {
    t_with_args(
        "row.prefix",
        &[("row", &row_number.to_string()), ("reason", reason)],
    )
}
