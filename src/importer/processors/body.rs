// ==========================================
// 工单系统 - 工单正文处理器
// ==========================================
// 自然键: zakaz_nid（对应已导入工单的 legacy_id）
// 说明: 只更新 legacy_body，从不新增工单，不写来源标记
// ==========================================

use crate::domain::types::SourceType;
use crate::i18n::{t, t_with_args};
use crate::importer::column_mapper::BodyColumnMapping;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::RawRecord;
use crate::importer::processors::{field, parse_key};
use crate::importer::row_processor::{JobContext, RowOutcome, RowProcessor};
use crate::repository::ApplicationRepository;
use rusqlite::Connection;

pub struct BodyProcessor {
    mapping: BodyColumnMapping,
}

impl BodyProcessor {
    pub fn new(mapping: BodyColumnMapping) -> Self {
        Self { mapping }
    }
}

impl RowProcessor for BodyProcessor {
    fn source_type(&self) -> SourceType {
        SourceType::Body
    }

    fn process(
        &mut self,
        conn: &Connection,
        record: &RawRecord,
        _ctx: &JobContext,
    ) -> ImportResult<RowOutcome> {
        let nid = match parse_key(record, &self.mapping.nid, "nid") {
            Ok(nid) => nid,
            Err(outcome) => return Ok(outcome),
        };

        let body = DataCleaner::clean_body(record.get_mapped(self.mapping.body.as_deref()));
        if body.is_empty() {
            return Ok(RowOutcome::Skipped(t("body.empty")));
        }

        let Some(existing) = ApplicationRepository::find_by_legacy_id_tx(conn, nid)? else {
            let number = field(record, &self.mapping.number).unwrap_or("-");
            return Ok(RowOutcome::Skipped(t_with_args(
                "body.order_missing",
                &[("nid", &nid.to_string()), ("number", number)],
            )));
        };

        if existing.legacy_body.as_deref() == Some(body.as_str()) {
            return Ok(RowOutcome::Unchanged);
        }

        ApplicationRepository::update_body_tx(conn, &existing.id, &body)?;
        Ok(RowOutcome::Updated)
    }
}
