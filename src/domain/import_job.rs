// ==========================================
// 工单系统 - 导入任务实体
// ==========================================
// 职责: ImportJob（单次请求生命周期）、LogEntry、EntityStats、ProgressFrame
// 红线:
// - current 单调不减，且 current <= total
// - current == total 当且仅当 phase == done
// - 任意时刻 total == imported + updated + skipped + errors
// ==========================================

use crate::domain::types::{LogLevel, Phase, SourceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

// ==========================================
// LogEntry - 推送给调用方的导入日志
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            details: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

// ==========================================
// EntityStats - 分类统计
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStats {
    pub total: u64,
    pub imported: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: u64,
}

impl EntityStats {
    pub fn record_imported(&mut self) {
        self.total += 1;
        self.imported += 1;
    }

    pub fn record_updated(&mut self) {
        self.total += 1;
        self.updated += 1;
    }

    pub fn record_skipped(&mut self) {
        self.total += 1;
        self.skipped += 1;
    }

    pub fn record_errors(&mut self, count: u64) {
        self.total += count;
        self.errors += count;
    }

    /// 合并另一个统计增量
    pub fn merge(&mut self, delta: &EntityStats) {
        self.total += delta.total;
        self.imported += delta.imported;
        self.updated += delta.updated;
        self.skipped += delta.skipped;
        self.errors += delta.errors;
    }

    /// total == imported + updated + skipped + errors
    pub fn is_balanced(&self) -> bool {
        self.total == self.imported + self.updated + self.skipped + self.errors
    }
}

/// 按分类键组织的统计快照
pub type StatsSnapshot = BTreeMap<String, EntityStats>;

// ==========================================
// ProgressFrame - 进度帧
// ==========================================
// 线格式: `data: <json>\n\n`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressFrame {
    pub phase: Phase,
    pub current: u64,
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
}

impl ProgressFrame {
    pub fn is_done(&self) -> bool {
        self.done.unwrap_or(false)
    }
}

// ==========================================
// ImportJob - 单次导入任务
// ==========================================
#[derive(Debug, Clone)]
pub struct ImportJob {
    pub job_id: String,
    pub batch_size: usize,
    pub record_limit: Option<usize>,
    pub phase: Phase,
    current: u64,
    total: u64,
    stats: StatsSnapshot,
    started_at: Instant,
}

impl ImportJob {
    /// 创建导入任务
    ///
    /// # 参数
    /// - categories: 参与本次任务的分类（决定统计快照中的 key）
    /// - total: 所有分类的待处理行数之和
    pub fn new(
        categories: &[SourceType],
        batch_size: usize,
        record_limit: Option<usize>,
        total: u64,
    ) -> Self {
        let stats = categories
            .iter()
            .map(|c| (c.stats_key().to_string(), EntityStats::default()))
            .collect();

        Self {
            job_id: Uuid::new_v4().to_string(),
            batch_size: batch_size.max(1),
            record_limit,
            phase: Phase::Init,
            current: 0,
            total,
            stats,
            started_at: Instant::now(),
        }
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn stats(&self) -> &StatsSnapshot {
        &self.stats
    }

    pub fn stats_for(&self, source: SourceType) -> EntityStats {
        self.stats.get(source.stats_key()).copied().unwrap_or_default()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// 合并批次增量并推进进度
    ///
    /// current 不会超过 total；批次行数以增量 total 为准
    pub fn apply_batch(&mut self, source: SourceType, delta: &EntityStats) {
        self.stats
            .entry(source.stats_key().to_string())
            .or_default()
            .merge(delta);
        self.current = (self.current + delta.total).min(self.total);
    }

    pub fn is_complete(&self) -> bool {
        self.current == self.total
    }

    pub fn has_errors(&self) -> bool {
        self.stats.values().any(|s| s.errors > 0)
    }

    /// 构造不带统计的帧（current 保持不变）
    pub fn frame(&self, log: Option<LogEntry>) -> ProgressFrame {
        ProgressFrame {
            phase: self.phase,
            current: self.current,
            total: self.total,
            log,
            stats: None,
            done: None,
        }
    }

    /// 构造指定 current 的行级日志帧
    pub fn row_frame(&self, current: u64, log: LogEntry) -> ProgressFrame {
        ProgressFrame {
            phase: self.phase,
            current: current.min(self.total),
            total: self.total,
            log: Some(log),
            stats: None,
            done: None,
        }
    }

    /// 构造带统计快照的帧
    pub fn stats_frame(&self, log: Option<LogEntry>) -> ProgressFrame {
        ProgressFrame {
            stats: Some(self.stats.clone()),
            ..self.frame(log)
        }
    }

    /// 构造终止帧（phase=done, done=true）
    pub fn done_frame(&mut self, log: LogEntry) -> ProgressFrame {
        self.phase = Phase::Done;
        ProgressFrame {
            done: Some(true),
            ..self.stats_frame(Some(log))
        }
    }

    /// 构造致命错误帧（phase=error, done=true）
    pub fn error_frame(&mut self, log: LogEntry) -> ProgressFrame {
        self.phase = Phase::Error;
        ProgressFrame {
            done: Some(true),
            ..self.stats_frame(Some(log))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_stats_balanced() {
        let mut stats = EntityStats::default();
        stats.record_imported();
        stats.record_updated();
        stats.record_skipped();
        stats.record_errors(2);
        assert!(stats.is_balanced());
        assert_eq!(stats.total, 5);

        let mut other = EntityStats::default();
        other.merge(&stats);
        assert_eq!(other, stats);
    }

    #[test]
    fn test_job_progress_never_exceeds_total() {
        let mut job = ImportJob::new(&[SourceType::WarehouseStock], 2, None, 3);
        let mut delta = EntityStats::default();
        delta.record_imported();
        delta.record_imported();
        job.apply_batch(SourceType::WarehouseStock, &delta);
        assert_eq!(job.current(), 2);
        assert!(!job.is_complete());

        job.apply_batch(SourceType::WarehouseStock, &delta);
        assert_eq!(job.current(), 3);
        assert!(job.is_complete());
        assert_eq!(job.stats_for(SourceType::WarehouseStock).imported, 4);
    }

    #[test]
    fn test_frame_serialization_skips_empty_fields() {
        let job = ImportJob::new(&[SourceType::Orders], 50, None, 10);
        let json = serde_json::to_value(job.frame(None)).unwrap();
        assert_eq!(json["phase"], "init");
        assert!(json.get("log").is_none());
        assert!(json.get("stats").is_none());
        assert!(json.get("done").is_none());
    }

    #[test]
    fn test_done_frame() {
        let mut job = ImportJob::new(&[SourceType::Orders], 50, None, 0);
        let frame = job.done_frame(LogEntry::success("ok"));
        assert!(frame.is_done());
        assert_eq!(frame.phase, Phase::Done);
        assert!(frame.stats.unwrap().contains_key("orders"));
    }
}
