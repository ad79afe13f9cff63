// ==========================================
// 工单系统 - 进度推送
// ==========================================
// 职责: 驱动批次提交器，按批推送 ProgressFrame
// 帧序列:
// - init: 开始 / 各分类行数 / 行数上限提示
// - processing-<entity>: 分类开始 -> (行级日志帧 + 批次统计帧)* -> 分类小结
// - 最后一批直接生成终止帧（phase=done, current == total, done=true）
// - 处理期致命错误: phase=error 终止帧
// 取消: 接收端断开后，当前批次照常提交，之后停止
// ==========================================

use crate::domain::import_job::{EntityStats, ImportJob, LogEntry, ProgressFrame};
use crate::domain::types::{Phase, SourceType};
use crate::i18n::{t, t_with_args};
use crate::importer::batch_committer::BatchCommitter;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::TabularFile;
use crate::importer::row_processor::{JobContext, RowProcessor};
use rusqlite::Connection;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

// ==========================================
// FrameSink - 帧输出端
// ==========================================
pub trait FrameSink {
    /// 推送一帧
    ///
    /// # 返回
    /// - false: 接收端已断开
    fn send(&mut self, frame: ProgressFrame) -> bool;
}

/// 有界通道输出（在阻塞线程中使用）
pub struct ChannelSink(pub mpsc::Sender<ProgressFrame>);

impl FrameSink for ChannelSink {
    fn send(&mut self, frame: ProgressFrame) -> bool {
        self.0.blocking_send(frame).is_ok()
    }
}

impl FrameSink for Vec<ProgressFrame> {
    fn send(&mut self, frame: ProgressFrame) -> bool {
        self.push(frame);
        true
    }
}

// ==========================================
// ImportSource - 单个分类的输入
// ==========================================
pub struct ImportSource {
    processor: Box<dyn RowProcessor>,
    file: TabularFile,
    rows: u64,
}

impl ImportSource {
    /// 创建分类输入并统计待处理行数（受 record_limit 约束）
    pub fn new(
        processor: Box<dyn RowProcessor>,
        file: TabularFile,
        record_limit: Option<usize>,
    ) -> ImportResult<Self> {
        let counted = file.count_records()?;
        let rows = record_limit.map_or(counted, |limit| counted.min(limit)) as u64;
        Ok(Self {
            processor,
            file,
            rows,
        })
    }

    pub fn source_type(&self) -> SourceType {
        self.processor.source_type()
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }
}

/// 创建导入任务
///
/// # 返回
/// - Err(EmptyInput): 所有分类均无数据行（启动期错误）
pub fn plan_job(
    sources: &[ImportSource],
    batch_size: usize,
    record_limit: Option<usize>,
) -> ImportResult<ImportJob> {
    let total: u64 = sources.iter().map(ImportSource::rows).sum();
    if total == 0 {
        let names: Vec<&str> = sources.iter().map(|s| s.file.name()).collect();
        return Err(ImportError::EmptyInput(names.join(", ")));
    }

    let categories: Vec<SourceType> = sources.iter().map(ImportSource::source_type).collect();
    Ok(ImportJob::new(&categories, batch_size, record_limit, total))
}

/// 任务结束状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed(String),
}

// ==========================================
// ProgressStreamer
// ==========================================
pub struct ProgressStreamer {
    committer: BatchCommitter,
}

impl ProgressStreamer {
    pub fn new(conn: Arc<Mutex<Connection>>, batch_size: usize) -> Self {
        Self {
            committer: BatchCommitter::new(conn, batch_size),
        }
    }

    /// 在阻塞线程中运行任务，返回帧接收端
    ///
    /// # 参数
    /// - buffer: 通道容量（帧）
    pub fn spawn(
        self,
        job: ImportJob,
        sources: Vec<ImportSource>,
        buffer: usize,
    ) -> mpsc::Receiver<ProgressFrame> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        tokio::task::spawn_blocking(move || {
            let mut sink = ChannelSink(tx);
            self.run(job, sources, &mut sink)
        });
        rx
    }

    /// 同步运行任务
    pub fn run(
        &self,
        mut job: ImportJob,
        mut sources: Vec<ImportSource>,
        sink: &mut dyn FrameSink,
    ) -> (ImportJob, RunStatus) {
        info!(
            job_id = %job.job_id,
            total = job.total(),
            batch_size = job.batch_size,
            record_limit = ?job.record_limit,
            "导入任务开始"
        );

        let status = self.drive(&mut job, &mut sources, sink);
        match &status {
            RunStatus::Completed => info!(
                job_id = %job.job_id,
                elapsed_secs = job.elapsed_secs(),
                "导入任务完成"
            ),
            RunStatus::Cancelled => warn!(
                job_id = %job.job_id,
                current = job.current(),
                total = job.total(),
                "接收端断开，导入在当前批次后停止"
            ),
            RunStatus::Failed(message) => error!(job_id = %job.job_id, error = %message, "导入任务失败"),
        }
        (job, status)
    }

    fn drive(
        &self,
        job: &mut ImportJob,
        sources: &mut [ImportSource],
        sink: &mut dyn FrameSink,
    ) -> RunStatus {
        job.phase = Phase::Init;
        if !self.announce(job, sources, sink) {
            return RunStatus::Cancelled;
        }

        let ctx = JobContext::new(job.job_id.clone());
        let active: Vec<usize> = (0..sources.len()).filter(|&i| sources[i].rows > 0).collect();
        let mut done_sent = false;

        for (position, &idx) in active.iter().enumerate() {
            let source = &mut sources[idx];
            let source_type = source.source_type();
            let category_rows = source.rows;
            let label = t(source_type.label_key());

            job.phase = Phase::Processing(source_type);
            let start = t_with_args("import.phase_start", &[("label", &label)]);
            if !sink.send(job.frame(Some(LogEntry::info(start)))) {
                return RunStatus::Cancelled;
            }

            let records = match source.file.records() {
                Ok(records) => records,
                Err(e) => return Self::fail(job, sink, &e),
            };

            let mut alive = true;
            let mut category_done: u64 = 0;
            let result = self.committer.commit_all(
                source.processor.as_mut(),
                records,
                job.record_limit,
                &ctx,
                |report| {
                    let base = job.current();
                    for row_log in &report.row_logs {
                        let frame = job.row_frame(base + row_log.offset as u64, row_log.entry.clone());
                        alive = alive && sink.send(frame);
                    }

                    job.apply_batch(source_type, &report.delta);
                    category_done += report.rows as u64;

                    if job.is_complete() {
                        let frame = Self::done_frame(job);
                        done_sent = true;
                        sink.send(frame);
                        return ControlFlow::Break(());
                    }

                    let progress = t_with_args(
                        "import.progress",
                        &[
                            ("label", &label),
                            ("current", &category_done.to_string()),
                            ("total", &category_rows.to_string()),
                        ],
                    );
                    alive = alive && sink.send(job.stats_frame(Some(LogEntry::info(progress))));

                    if alive {
                        ControlFlow::Continue(())
                    } else {
                        ControlFlow::Break(())
                    }
                },
            );

            if let Err(e) = result {
                return Self::fail(job, sink, &e);
            }
            if done_sent {
                return RunStatus::Completed;
            }
            if !alive {
                return RunStatus::Cancelled;
            }

            if position + 1 < active.len() {
                let summary = Self::category_summary(source_type, job.stats_for(source_type));
                let entry = if job.stats_for(source_type).errors > 0 {
                    LogEntry::warning(summary)
                } else {
                    LogEntry::success(summary)
                };
                if !sink.send(job.stats_frame(Some(entry))) {
                    return RunStatus::Cancelled;
                }
            }
        }

        if !done_sent {
            // 行数与预统计不一致时兜底发送终止帧
            warn!(
                job_id = %job.job_id,
                current = job.current(),
                total = job.total(),
                "处理行数少于预统计行数"
            );
            sink.send(Self::done_frame(job));
        }
        RunStatus::Completed
    }

    /// init 阶段的说明帧
    fn announce(&self, job: &ImportJob, sources: &[ImportSource], sink: &mut dyn FrameSink) -> bool {
        let mut entries = vec![LogEntry::info(t("import.start"))];
        for source in sources {
            entries.push(LogEntry::info(t_with_args(
                "import.found",
                &[
                    ("label", &t(source.source_type().label_key())),
                    ("count", &source.rows.to_string()),
                ],
            )));
        }
        if let Some(limit) = job.record_limit {
            entries.push(LogEntry::warning(t_with_args(
                "import.limit",
                &[("limit", &limit.to_string())],
            )));
        }

        entries
            .into_iter()
            .all(|entry| sink.send(job.frame(Some(entry))))
    }

    fn category_summary(source_type: SourceType, stats: EntityStats) -> String {
        t_with_args(
            "import.category_summary",
            &[
                ("label", &t(source_type.label_key())),
                ("imported", &stats.imported.to_string()),
                ("updated", &stats.updated.to_string()),
                ("skipped", &stats.skipped.to_string()),
                ("errors", &stats.errors.to_string()),
            ],
        )
    }

    fn done_frame(job: &mut ImportJob) -> ProgressFrame {
        let details: Vec<String> = job
            .stats()
            .keys()
            .filter_map(|key| stats_source(key))
            .map(|source| Self::category_summary(source, job.stats_for(source)))
            .collect();
        let message = t_with_args(
            "import.done",
            &[("seconds", &format!("{:.1}", job.elapsed_secs()))],
        );
        let entry = if job.has_errors() {
            LogEntry::warning(message)
        } else {
            LogEntry::success(message)
        };
        job.done_frame(entry.with_details(details.join("\n")))
    }

    fn fail(job: &mut ImportJob, sink: &mut dyn FrameSink, e: &ImportError) -> RunStatus {
        let message = t_with_args("import.fatal", &[("error", &e.to_string())]);
        sink.send(job.error_frame(LogEntry::error(message)));
        RunStatus::Failed(e.to_string())
    }
}

/// 统计键 -> 来源
fn stats_source(key: &str) -> Option<SourceType> {
    SourceType::ALL
        .into_iter()
        .find(|source| source.stats_key() == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_schema, open_sqlite_connection};
    use crate::importer::column_mapper::{ColumnMapping, UserColumnMapping};
    use crate::importer::processors::UserProcessor;

    fn setup() -> Arc<Mutex<Connection>> {
        let conn = open_sqlite_connection(":memory:").unwrap();
        init_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn users_source(content: &str, limit: Option<usize>) -> ImportSource {
        ImportSource::new(
            Box::new(UserProcessor::new(UserColumnMapping::legacy_default())),
            TabularFile::new("users.tsv", content.as_bytes().to_vec()).unwrap(),
            limit,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_plan_is_setup_error() {
        let sources = vec![users_source("uid\tname\n", None)];
        assert!(matches!(plan_job(&sources, 10, None), Err(ImportError::EmptyInput(_))));
    }

    #[test]
    fn test_done_frame_is_last_batch() {
        let conn = setup();
        let sources = vec![users_source(
            "uid\tname\n1\tА\n2\tБ\n0\tАноним\n4\tГ\n5\tД\n",
            None,
        )];
        let job = plan_job(&sources, 2, None).unwrap();
        let mut frames: Vec<ProgressFrame> = Vec::new();
        let (job, status) = ProgressStreamer::new(conn, 2).run(job, sources, &mut frames);

        assert_eq!(status, RunStatus::Completed);
        let stats = job.stats_for(SourceType::Users);
        assert_eq!(stats.imported, 4);
        assert_eq!(stats.skipped, 1);

        let last = frames.last().unwrap();
        assert!(last.is_done());
        assert_eq!(last.phase, Phase::Done);
        assert_eq!(last.current, 5);
        assert_eq!(frames.iter().filter(|f| f.is_done()).count(), 1);

        let batch_currents: Vec<u64> = frames
            .iter()
            .filter(|f| f.stats.is_some())
            .map(|f| f.current)
            .collect();
        assert_eq!(batch_currents, vec![2, 4, 5]);

        // 匿名用户位于第 3 行（批内偏移 0，之前已完成 2 行）
        let warning = frames
            .iter()
            .find(|f| f.stats.is_none() && f.phase == Phase::Processing(SourceType::Users) && f.current == 2)
            .unwrap();
        assert_eq!(
            warning.log.as_ref().map(|l| l.level),
            Some(crate::domain::types::LogLevel::Warning)
        );

        let mut previous = 0;
        for frame in &frames {
            assert!(frame.current >= previous);
            previous = frame.current;
        }
    }

    /// 只接收前 n 帧的输出端
    struct ClosingSink {
        remaining: usize,
        frames: Vec<ProgressFrame>,
    }

    impl FrameSink for ClosingSink {
        fn send(&mut self, frame: ProgressFrame) -> bool {
            if self.remaining == 0 {
                return false;
            }
            self.remaining -= 1;
            self.frames.push(frame);
            true
        }
    }

    #[test]
    fn test_disconnect_stops_after_current_batch() {
        let conn = setup();
        let sources = vec![users_source("uid\tname\n1\tА\n2\tБ\n3\tВ\n4\tГ\n", None)];
        let job = plan_job(&sources, 2, None).unwrap();

        // init: 开始 + 行数；processing: 分类开始；之后断开
        let mut sink = ClosingSink {
            remaining: 3,
            frames: Vec::new(),
        };
        let (job, status) = ProgressStreamer::new(conn.clone(), 2).run(job, sources, &mut sink);

        assert_eq!(status, RunStatus::Cancelled);
        assert_eq!(job.current(), 2);
        let persisted: i64 = conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(persisted, 2);
    }

    #[test]
    fn test_record_limit_caps_total() {
        let conn = setup();
        let sources = vec![users_source("uid\tname\n1\tА\n2\tБ\n3\tВ\n", Some(2))];
        let job = plan_job(&sources, 10, Some(2)).unwrap();
        assert_eq!(job.total(), 2);

        let mut frames: Vec<ProgressFrame> = Vec::new();
        let (job, _) = ProgressStreamer::new(conn, 10).run(job, sources, &mut frames);
        assert_eq!(job.stats_for(SourceType::Users).total, 2);
        assert!(frames.last().unwrap().is_done());
    }
}
