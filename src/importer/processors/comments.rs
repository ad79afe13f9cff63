// ==========================================
// 工单系统 - 旧系统评论处理器
// ==========================================
// 自然键: cid；父工单按 nid 查找（须已导入）
// ==========================================

use crate::domain::records::CommentFields;
use crate::domain::types::SourceType;
use crate::i18n::{t, t_with_args};
use crate::importer::column_mapper::CommentColumnMapping;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::RawRecord;
use crate::importer::processors::{field, legacy_timestamp, parse_key};
use crate::importer::row_processor::{JobContext, RowOutcome, RowProcessor};
use crate::repository::{ApplicationRepository, CommentRepository};
use chrono::Utc;
use rusqlite::Connection;

/// 作者缺失时的占位
pub const SYSTEM_AUTHOR: &str = "Система";

pub struct CommentProcessor {
    mapping: CommentColumnMapping,
}

impl CommentProcessor {
    pub fn new(mapping: CommentColumnMapping) -> Self {
        Self { mapping }
    }

    /// 主题加粗置顶，再做 HTML 清洗
    fn comment_text(&self, record: &RawRecord) -> String {
        let body = field(record, &self.mapping.comment).unwrap_or("");
        let text = match field(record, &self.mapping.subject) {
            Some(subject) => format!("**{}**\n\n{}", subject, body),
            None => body.to_string(),
        };
        DataCleaner::clean_comment_html(&text)
    }
}

impl RowProcessor for CommentProcessor {
    fn source_type(&self) -> SourceType {
        SourceType::Comments
    }

    fn process(
        &mut self,
        conn: &Connection,
        record: &RawRecord,
        ctx: &JobContext,
    ) -> ImportResult<RowOutcome> {
        let cid = match parse_key(record, &self.mapping.cid, "cid") {
            Ok(cid) => cid,
            Err(outcome) => return Ok(outcome),
        };
        let nid = match parse_key(record, &self.mapping.nid, "nid") {
            Ok(nid) => nid,
            Err(outcome) => return Ok(outcome),
        };

        let Some(application_id) = ApplicationRepository::find_id_by_legacy_id_tx(conn, nid)? else {
            return Ok(RowOutcome::Skipped(t_with_args(
                "row.order_missing",
                &[("nid", &nid.to_string())],
            )));
        };

        let comment = self.comment_text(record);
        if comment.is_empty() {
            return Ok(RowOutcome::Skipped(t("comments.empty_text")));
        }

        let fields = CommentFields {
            application_id,
            user_name: field(record, &self.mapping.user_name)
                .unwrap_or(SYSTEM_AUTHOR)
                .to_string(),
            comment,
        };

        match CommentRepository::find_by_legacy_id_tx(conn, cid)? {
            Some((_, existing)) if existing == fields => Ok(RowOutcome::Unchanged),
            Some((id, _)) => {
                CommentRepository::update_tx(conn, &id, &fields)?;
                Ok(RowOutcome::Updated)
            }
            None => {
                let created_at = legacy_timestamp(record, &self.mapping.created_at)
                    .unwrap_or_else(|| Utc::now().to_rfc3339());
                CommentRepository::insert_tx(
                    conn,
                    cid,
                    &fields,
                    &created_at,
                    &ctx.provenance(SourceType::Comments),
                )?;
                Ok(RowOutcome::Imported)
            }
        }
    }
}
