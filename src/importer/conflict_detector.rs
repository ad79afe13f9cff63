// ==========================================
// 工单系统 - 物料名称冲突检测
// ==========================================
// 职责: 导入前比对文件中的物料名称与库中名称
// 红线: 只读，不写库
// 规则:
// - 文件内重复编码以最后一次出现为准（位置保持首次出现处）
// - 名称比较区分大小写
// ==========================================

use crate::domain::records::{ConflictEntry, ConflictReport};
use crate::importer::column_mapper::StockColumnMapping;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::TabularFile;
use crate::importer::processors::field;
use crate::repository::StockRepository;
use std::collections::HashMap;
use tracing::debug;

pub struct ConflictDetector<'a> {
    repo: &'a StockRepository,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(repo: &'a StockRepository) -> Self {
        Self { repo }
    }

    /// 检测名称冲突
    ///
    /// # 参数
    /// - mapping: 已通过校验的库存列映射
    pub fn detect(&self, file: &TabularFile, mapping: &StockColumnMapping) -> ImportResult<ConflictReport> {
        let mut order: Vec<String> = Vec::new();
        let mut names: HashMap<String, String> = HashMap::new();

        for record in file.records()? {
            let record = record?;
            let (Some(code), Some(name)) = (field(&record, &mapping.code), field(&record, &mapping.name))
            else {
                continue;
            };
            if names.insert(code.to_string(), name.to_string()).is_none() {
                order.push(code.to_string());
            }
        }

        let existing = self.repo.find_names_by_codes(&order)?;
        let mut report = ConflictReport {
            total: order.len(),
            ..Default::default()
        };

        for code in order {
            let new_name = names.remove(&code).unwrap_or_default();
            match existing.get(&code) {
                Some(existing_name) => {
                    report.existing_materials += 1;
                    if *existing_name != new_name {
                        report.conflicts.push(ConflictEntry {
                            code,
                            existing_name: existing_name.clone(),
                            new_name,
                        });
                    }
                }
                None => report.new_materials += 1,
            }
        }

        debug!(
            file = file.name(),
            total = report.total,
            conflicts = report.conflicts.len(),
            "名称冲突检测完成"
        );
        Ok(report)
    }
}
