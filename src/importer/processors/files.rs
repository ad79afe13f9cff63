// ==========================================
// 工单系统 - 旧系统附件元数据处理器
// ==========================================
// 自然键: fid；父工单按 nid 查找
// 说明: 只导入元数据，不搬运文件内容
// ==========================================

use crate::domain::records::FileFields;
use crate::domain::types::SourceType;
use crate::i18n::t_with_args;
use crate::importer::column_mapper::FileColumnMapping;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::RawRecord;
use crate::importer::processors::{field, legacy_timestamp, parse_key};
use crate::importer::row_processor::{JobContext, RowOutcome, RowProcessor};
use crate::repository::{ApplicationRepository, FileRepository};
use chrono::Utc;
use rusqlite::Connection;

const UNKNOWN_FILENAME: &str = "unknown";
const DEFAULT_MIME: &str = "application/octet-stream";

pub struct FileProcessor {
    mapping: FileColumnMapping,
}

impl FileProcessor {
    pub fn new(mapping: FileColumnMapping) -> Self {
        Self { mapping }
    }
}

impl RowProcessor for FileProcessor {
    fn source_type(&self) -> SourceType {
        SourceType::Files
    }

    fn process(
        &mut self,
        conn: &Connection,
        record: &RawRecord,
        ctx: &JobContext,
    ) -> ImportResult<RowOutcome> {
        let m = &self.mapping;
        let fid = match parse_key(record, &m.fid, "fid") {
            Ok(fid) => fid,
            Err(outcome) => return Ok(outcome),
        };
        let nid = match parse_key(record, &m.nid, "nid") {
            Ok(nid) => nid,
            Err(outcome) => return Ok(outcome),
        };

        let Some(application_id) = ApplicationRepository::find_id_by_legacy_id_tx(conn, nid)? else {
            return Ok(RowOutcome::Skipped(t_with_args(
                "row.order_missing",
                &[("nid", &nid.to_string())],
            )));
        };

        let filename = field(record, &m.filename).unwrap_or(UNKNOWN_FILENAME);
        let fields = FileFields {
            application_id,
            legacy_path: field(record, &m.filepath)
                .or_else(|| field(record, &m.file_url))
                .map(str::to_string),
            original_filename: filename.to_string(),
            stored_filename: format!("legacy_{}_{}", fid, filename),
            file_size: field(record, &m.filesize)
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(0),
            mime_type: field(record, &m.filemime).unwrap_or(DEFAULT_MIME).to_string(),
            description: field(record, &m.description).map(str::to_string),
        };

        match FileRepository::find_by_legacy_id_tx(conn, fid)? {
            Some((_, existing)) if existing == fields => Ok(RowOutcome::Unchanged),
            Some((id, _)) => {
                FileRepository::update_tx(conn, &id, &fields)?;
                Ok(RowOutcome::Updated)
            }
            None => {
                let uploaded_at = legacy_timestamp(record, &m.uploaded_at)
                    .unwrap_or_else(|| Utc::now().to_rfc3339());
                FileRepository::insert_tx(
                    conn,
                    fid,
                    &fields,
                    &uploaded_at,
                    &ctx.provenance(SourceType::Files),
                )?;
                Ok(RowOutcome::Imported)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::column_mapper::{ColumnMapping, OrderColumnMapping};
    use crate::importer::processors::test_support::{conn, record};
    use crate::importer::processors::OrderProcessor;
    use crate::importer::stage_mapper::StageTable;
    use std::sync::Arc;

    #[test]
    fn test_file_metadata_defaults() {
        let conn = conn();
        OrderProcessor::new(OrderColumnMapping::legacy_default(), Arc::new(StageTable::legacy()))
            .process(&conn, &record(2, &[("nid", "5")]), &JobContext::new("seed"))
            .unwrap();

        let mut p = FileProcessor::new(FileColumnMapping::legacy_default());
        let row = record(
            2,
            &[("fid", "77"), ("nid", "5"), ("file_url", "http://old/files/a.pdf"), ("filesize", "x")],
        );
        assert_eq!(p.process(&conn, &row, &JobContext::new("job")).unwrap(), RowOutcome::Imported);

        let (_, stored) = FileRepository::find_by_legacy_id_tx(&conn, 77).unwrap().unwrap();
        assert_eq!(stored.original_filename, "unknown");
        assert_eq!(stored.stored_filename, "legacy_77_unknown");
        assert_eq!(stored.mime_type, "application/octet-stream");
        assert_eq!(stored.legacy_path.as_deref(), Some("http://old/files/a.pdf"));
        assert_eq!(stored.file_size, 0);

        assert_eq!(p.process(&conn, &row, &JobContext::new("job")).unwrap(), RowOutcome::Unchanged);
    }
}
