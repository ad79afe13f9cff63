// ==========================================
// 工单系统 - 各来源行处理器
// ==========================================
// 职责: 单行记录 -> 自然键查询 -> 新增 / 更新 / 跳过
// 说明: 处理器不缓存数据库状态，每行都以数据库为准（保证批大小无关性）
// 说明: 目录/节点导入在启动前扫描一遍文件，重复键只处理最后一次出现的行
// ==========================================

pub mod body;
pub mod comments;
pub mod files;
pub mod materials;
pub mod nodes;
pub mod orders;
pub mod stock;
pub mod users;

pub use body::BodyProcessor;
pub use comments::CommentProcessor;
pub use files::FileProcessor;
pub use materials::MaterialCatalogProcessor;
pub use nodes::NodeProcessor;
pub use orders::OrderProcessor;
pub use stock::StockProcessor;
pub use users::UserProcessor;

use crate::i18n::t_with_args;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::{RawRecord, TabularFile};
use crate::importer::row_processor::RowOutcome;
use std::collections::HashMap;

/// 取映射列的值（NULL 标准化后）
pub(crate) fn field<'a>(record: &'a RawRecord, header: &Option<String>) -> Option<&'a str> {
    DataCleaner::non_null(record.get_mapped(header.as_deref()))
}

/// 必填字段缺失
pub(crate) fn missing(field_name: &str) -> RowOutcome {
    RowOutcome::Skipped(t_with_args("row.missing_field", &[("field", field_name)]))
}

/// 解析整数自然键（nid / cid / fid / uid）
///
/// # 返回
/// - Err(outcome): 缺失或非数字，直接作为行结果返回
pub(crate) fn parse_key(
    record: &RawRecord,
    header: &Option<String>,
    field_name: &str,
) -> Result<i64, RowOutcome> {
    let raw = field(record, header).ok_or_else(|| missing(field_name))?;
    raw.parse::<i64>().map_err(|_| {
        RowOutcome::Skipped(t_with_args(
            "row.invalid_key",
            &[("field", field_name), ("value", raw)],
        ))
    })
}

/// 旧系统时间 -> RFC3339 文本
pub(crate) fn legacy_timestamp(record: &RawRecord, header: &Option<String>) -> Option<String> {
    field(record, header)
        .and_then(DataCleaner::parse_legacy_datetime)
        .map(|dt| dt.to_rfc3339())
}

/// 文件内重复键: 键 -> 最后一次出现的行号
#[derive(Debug, Default)]
pub(crate) struct LastOccurrence {
    rows: HashMap<String, usize>,
}

impl LastOccurrence {
    /// 扫描 record_limit 以内的行（与提交器看到的行一致）
    pub(crate) fn scan(
        file: &TabularFile,
        record_limit: Option<usize>,
        key: impl Fn(&RawRecord) -> Option<String>,
    ) -> ImportResult<Self> {
        let mut rows = HashMap::new();
        for record in file.records()?.take(record_limit.unwrap_or(usize::MAX)) {
            let record = record?;
            if let Some(k) = key(&record) {
                rows.insert(k, record.row_number);
            }
        }
        Ok(Self { rows })
    }

    /// 不是最后一次出现时返回跳过结果
    pub(crate) fn superseded(&self, key: &str, row_number: usize) -> Option<RowOutcome> {
        match self.rows.get(key) {
            Some(&last) if last != row_number => Some(RowOutcome::Skipped(t_with_args(
                "row.duplicate_in_file",
                &[("key", key), ("row", &last.to_string())],
            ))),
            _ => None,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::record;
    use super::*;

    #[test]
    fn test_parse_key() {
        let header = Some("nid".to_string());
        assert_eq!(parse_key(&record(2, &[("nid", "42")]), &header, "nid"), Ok(42));
        assert!(matches!(
            parse_key(&record(2, &[("nid", "NULL")]), &header, "nid"),
            Err(RowOutcome::Skipped(_))
        ));
        assert!(matches!(
            parse_key(&record(2, &[("nid", "abc")]), &header, "nid"),
            Err(RowOutcome::Skipped(_))
        ));
        assert!(matches!(parse_key(&record(2, &[]), &None, "nid"), Err(RowOutcome::Skipped(_))));
    }

    #[test]
    fn test_last_occurrence_respects_limit() {
        let file = super::test_support::csv("code,name\nA,первый\nB,второй\nA,третий\n");
        let key = |r: &RawRecord| DataCleaner::non_null_owned(r.get("code"));

        let all = LastOccurrence::scan(&file, None, key).unwrap();
        assert!(matches!(all.superseded("A", 2), Some(RowOutcome::Skipped(_))));
        assert_eq!(all.superseded("A", 4), None);
        assert_eq!(all.superseded("B", 3), None);

        // 第 4 行超出限制，不参与去重
        let limited = LastOccurrence::scan(&file, Some(2), key).unwrap();
        assert_eq!(limited.superseded("A", 2), None);
    }
}
