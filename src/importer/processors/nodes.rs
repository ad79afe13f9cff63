// ==========================================
// 工单系统 - 网络节点处理器
// ==========================================
// 自然键: 节点 code（清洗后）
// 规则:
// - code 与地址必填
// - 状态: 含“проектир”为 planned，其余为 existing
// - 文件内同一 code 出现多次时只处理最后一次，其余行跳过
// ==========================================

use crate::domain::records::NodeFields;
use crate::domain::types::{NodeStatus, SourceType};
use crate::importer::column_mapper::NodeColumnMapping;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::{RawRecord, TabularFile};
use crate::importer::processors::{field, missing, LastOccurrence};
use crate::importer::row_processor::{JobContext, RowOutcome, RowProcessor};
use crate::repository::NodeRepository;
use rusqlite::Connection;

pub struct NodeProcessor {
    mapping: NodeColumnMapping,
    last: LastOccurrence,
}

impl NodeProcessor {
    pub fn new(mapping: NodeColumnMapping, file: &TabularFile, record_limit: Option<usize>) -> ImportResult<Self> {
        let last = LastOccurrence::scan(file, record_limit, |record| Self::code(&mapping, record))?;
        Ok(Self { mapping, last })
    }

    fn code(mapping: &NodeColumnMapping, record: &RawRecord) -> Option<String> {
        field(record, &mapping.code).and_then(DataCleaner::clean_node_code)
    }

    fn optional(record: &RawRecord, header: &Option<String>) -> Option<String> {
        field(record, header).map(str::to_string)
    }
}

impl RowProcessor for NodeProcessor {
    fn source_type(&self) -> SourceType {
        SourceType::Nodes
    }

    fn process(
        &mut self,
        conn: &Connection,
        record: &RawRecord,
        ctx: &JobContext,
    ) -> ImportResult<RowOutcome> {
        let m = &self.mapping;
        let Some(code) = Self::code(m, record) else {
            return Ok(missing("code"));
        };
        let Some(address) = field(record, &m.address) else {
            return Ok(missing("address"));
        };

        if let Some(outcome) = self.last.superseded(&code, record.row_number) {
            return Ok(outcome);
        }

        let status = NodeStatus::from_label(field(record, &m.status).unwrap_or_default());
        let fields = NodeFields {
            address: address.to_string(),
            location_details: Self::optional(record, &m.location_details),
            comm_info: Self::optional(record, &m.comm_info),
            status: status.as_str().to_string(),
            contract_link: Self::optional(record, &m.contract_link),
            node_created_date: field(record, &m.created_date)
                .and_then(DataCleaner::parse_node_date)
                .map(|date| date.format("%Y-%m-%d").to_string()),
        };

        match NodeRepository::find_by_code_tx(conn, &code)? {
            Some(existing) if existing.fields == fields => Ok(RowOutcome::Unchanged),
            Some(existing) => {
                NodeRepository::update_tx(conn, &existing.id, &fields)?;
                Ok(RowOutcome::Updated)
            }
            None => {
                NodeRepository::insert_tx(conn, &code, &fields, &ctx.provenance(SourceType::Nodes))?;
                Ok(RowOutcome::Imported)
            }
        }
    }
}
