// ==========================================
// 工单系统 - 导入批次回滚
// ==========================================
// 职责: 按来源标记删除导入产生的记录；统计各分类的标记记录数
// 规则:
// - all 按依赖顺序: comments -> files -> orders -> users -> stock -> materials -> nodes
// - stock 先删库存行再删物料；仍被其他来源库存行引用的物料保留
// - 删除工单时其评论/附件/日志级联删除（外键 ON DELETE CASCADE）
// - 分块提交；某块失败时返回已删除计数与错误，后续分类不再执行
// ==========================================

use crate::domain::records::ReverseReport;
use crate::domain::types::CohortCategory;
use crate::repository::{tagged_tables, CohortRepository, RepositoryResult};
use std::collections::BTreeMap;
use tracing::{error, info, instrument};

pub struct CohortReverser<'a> {
    repo: &'a CohortRepository,
    chunk_size: usize,
}

impl<'a> CohortReverser<'a> {
    pub fn new(repo: &'a CohortRepository, chunk_size: usize) -> Self {
        Self {
            repo,
            chunk_size: chunk_size.max(1),
        }
    }

    /// 各分类的标记记录数
    pub fn counts(&self) -> RepositoryResult<BTreeMap<String, u64>> {
        let mut counts = BTreeMap::new();
        for category in CohortCategory::DEPENDENCY_ORDER {
            let mut count = 0;
            for (table, source) in tagged_tables(category) {
                count += self.repo.count_tagged(table, *source)?;
            }
            counts.insert(category.as_str().to_string(), count);
        }
        Ok(counts)
    }

    /// 回滚指定分类
    #[instrument(skip(self), fields(chunk_size = self.chunk_size))]
    pub fn reverse(&self, category: CohortCategory) -> ReverseReport {
        let mut report = ReverseReport::default();

        for target in category.expand() {
            let key = target.as_str().to_string();
            report.deleted.insert(key.clone(), 0);

            for (table, source) in tagged_tables(target) {
                loop {
                    match self.repo.delete_tagged_chunk(table, *source, self.chunk_size) {
                        Ok(0) => break,
                        Ok(deleted) => {
                            *report.deleted.entry(key.clone()).or_default() += deleted;
                        }
                        Err(e) => {
                            error!(table = *table, error = %e, "分块删除失败，回滚中止");
                            report.error = Some(e.to_string());
                            return report;
                        }
                    }
                }
            }

            info!(category = %target, deleted = report.deleted[&key], "分类回滚完成");
        }

        report
    }
}
