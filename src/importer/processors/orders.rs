// ==========================================
// 工单系统 - 旧系统工单处理器
// ==========================================
// 自然键: nid (legacy_id)
// 规则:
// - 阶段为空 -> new / normal；未知阶段 -> 行级错误
// - 有公司名 -> 企业客户，客户名取公司名；否则取 FIO（缺省 "Не указано"）
// - 已存在: 映射字段有变化 -> updated，否则 skipped
// ==========================================

use crate::domain::records::ApplicationFields;
use crate::domain::types::{CustomerType, OrderStatus, SourceType, Urgency};
use crate::i18n::t_with_args;
use crate::importer::column_mapper::OrderColumnMapping;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::RawRecord;
use crate::importer::processors::{field, legacy_timestamp, parse_key};
use crate::importer::row_processor::{JobContext, RowOutcome, RowProcessor};
use crate::importer::stage_mapper::{StageMappingRule, StageTable};
use crate::repository::ApplicationRepository;
use rusqlite::Connection;
use std::sync::Arc;

/// 客户名缺失时的占位
pub const UNKNOWN_CUSTOMER: &str = "Не указано";

/// 拼入 client_comment 的技术字段: (旧系统列名, 标签)
const EXTRA_INFO_COLUMNS: &[(&str, &str)] = &[
    ("node_uid", "Создал заявку (uid)"),
    ("field_all_account_value", "Лицевой счёт"),
    ("field_all_ndogovor_value", "Договор"),
    ("field_all_ddogovor_value", "Дата договора"),
    ("field_all_login_value", "Логин"),
    ("field_all_ip_adres_value", "IP"),
    ("field_all_tarif_value", "Тариф"),
    ("field_all_uzel_value", "Узел"),
    ("field_all_port_value", "Порт"),
    ("field_all_mac_value", "MAC"),
    ("field_all_price_value", "Цена"),
    ("field_all_oplata_value", "Оплата"),
    ("field_all_job_value", "Работы"),
    ("field_all_kurator_value", "Куратор"),
    ("field_all_manager_value", "Менеджер"),
];

const DEFAULT_STAGE: StageMappingRule = StageMappingRule {
    status: OrderStatus::New,
    urgency: Urgency::Normal,
};

pub struct OrderProcessor {
    mapping: OrderColumnMapping,
    stages: Arc<StageTable>,
}

impl OrderProcessor {
    pub fn new(mapping: OrderColumnMapping, stages: Arc<StageTable>) -> Self {
        Self { mapping, stages }
    }

    /// 拼装技术信息备注
    fn client_comment(record: &RawRecord) -> Option<String> {
        let lines: Vec<String> = EXTRA_INFO_COLUMNS
            .iter()
            .filter_map(|(header, label)| {
                DataCleaner::non_null(record.get(header)).map(|v| format!("{}: {}", label, v))
            })
            .collect();

        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    /// 记录 -> 工单字段
    ///
    /// # 返回
    /// - Err(outcome): 阶段无法映射
    fn build_fields(&self, nid: i64, record: &RawRecord) -> Result<ApplicationFields, RowOutcome> {
        let m = &self.mapping;

        let stage = field(record, &m.stage);
        let rule = match stage {
            None => DEFAULT_STAGE,
            Some(label) => self.stages.map(label).map_err(|_| {
                RowOutcome::Failed(t_with_args("orders.unmapped_stage", &[("stage", label)]))
            })?,
        };

        let company = field(record, &m.company);
        let fio = field(record, &m.fio);
        let fio2 = field(record, &m.fio2);

        let (customer_type, customer_fullname, contact_person) = match company {
            Some(company) => (CustomerType::Business, company, fio.or(fio2)),
            None => (
                CustomerType::Individual,
                fio.unwrap_or(UNKNOWN_CUSTOMER),
                fio2,
            ),
        };

        let application_number = field(record, &m.number)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(nid);

        let mut fields = ApplicationFields {
            legacy_stage: stage.map(str::to_string),
            application_number,
            customer_type: customer_type.as_str().to_string(),
            customer_fullname: customer_fullname.to_string(),
            customer_phone: field(record, &m.phone1).unwrap_or_default().to_string(),
            contact_person: contact_person.map(str::to_string),
            contact_phone: field(record, &m.phone2).map(str::to_string),
            service_type: DataCleaner::map_service_type(field(record, &m.order_type).unwrap_or(""))
                .as_str()
                .to_string(),
            status: String::new(),
            urgency: String::new(),
            street_and_house: field(record, &m.address).map(str::to_string),
            address_details: field(record, &m.address2).map(str::to_string),
            client_comment: Self::client_comment(record),
        };
        fields.set_stage(rule.status, rule.urgency);
        Ok(fields)
    }
}

impl RowProcessor for OrderProcessor {
    fn source_type(&self) -> SourceType {
        SourceType::Orders
    }

    fn process(
        &mut self,
        conn: &Connection,
        record: &RawRecord,
        ctx: &JobContext,
    ) -> ImportResult<RowOutcome> {
        let nid = match parse_key(record, &self.mapping.nid, "nid") {
            Ok(nid) => nid,
            Err(outcome) => return Ok(outcome),
        };

        let fields = match self.build_fields(nid, record) {
            Ok(fields) => fields,
            Err(outcome) => return Ok(outcome),
        };

        match ApplicationRepository::find_by_legacy_id_tx(conn, nid)? {
            Some(existing) if existing.fields == fields => Ok(RowOutcome::Unchanged),
            Some(existing) => {
                ApplicationRepository::update_fields_tx(conn, &existing.id, &fields)?;
                Ok(RowOutcome::Updated)
            }
            None => {
                let created_at = legacy_timestamp(record, &self.mapping.created_at);
                ApplicationRepository::insert_tx(
                    conn,
                    nid,
                    &fields,
                    created_at.as_deref(),
                    &ctx.provenance(SourceType::Orders),
                )?;
                Ok(RowOutcome::Imported)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::column_mapper::ColumnMapping;
    use crate::importer::processors::test_support::{conn, record};

    fn processor() -> OrderProcessor {
        OrderProcessor::new(OrderColumnMapping::legacy_default(), Arc::new(StageTable::legacy()))
    }

    #[test]
    fn test_insert_then_unchanged_then_updated() {
        let conn = conn();
        let ctx = JobContext::new("job-1");
        let mut p = processor();

        let row = record(
            2,
            &[
                ("nid", "101"),
                ("field_etap_value", "1.2. Аварийная заявка"),
                ("field_all_fio_value", "Иванов И.И."),
                ("field_all_phone1_value", "+7 900 000-00-00"),
                ("field_all_account_value", "LS-77"),
                ("field_all_tarif_value", "NULL"),
            ],
        );
        assert_eq!(p.process(&conn, &row, &ctx).unwrap(), RowOutcome::Imported);

        let stored = ApplicationRepository::find_by_legacy_id_tx(&conn, 101)
            .unwrap()
            .unwrap();
        assert_eq!(stored.fields.status, "new");
        assert_eq!(stored.fields.urgency, "critical");
        assert_eq!(stored.fields.customer_type, "individual");
        assert_eq!(stored.fields.application_number, 101);
        assert_eq!(stored.fields.client_comment.as_deref(), Some("Лицевой счёт: LS-77"));

        assert_eq!(p.process(&conn, &row, &ctx).unwrap(), RowOutcome::Unchanged);

        let changed = record(
            2,
            &[
                ("nid", "101"),
                ("field_etap_value", "9. Выполнена"),
                ("field_all_fio_value", "Иванов И.И."),
                ("field_all_phone1_value", "+7 900 000-00-00"),
                ("field_all_account_value", "LS-77"),
            ],
        );
        assert_eq!(p.process(&conn, &changed, &ctx).unwrap(), RowOutcome::Updated);
        let stored = ApplicationRepository::find_by_legacy_id_tx(&conn, 101)
            .unwrap()
            .unwrap();
        assert_eq!(stored.fields.status, "installed");
        assert_eq!(stored.fields.urgency, "normal");
    }

    #[test]
    fn test_business_customer() {
        let conn = conn();
        let mut p = processor();
        let row = record(
            2,
            &[
                ("nid", "7"),
                ("field_all_company_value", "ООО Ромашка"),
                ("field_all_fio2_value", "Петров"),
                ("field_all_number_value", "5007"),
            ],
        );
        p.process(&conn, &row, &JobContext::new("job")).unwrap();

        let stored = ApplicationRepository::find_by_legacy_id_tx(&conn, 7).unwrap().unwrap();
        assert_eq!(stored.fields.customer_type, "business");
        assert_eq!(stored.fields.customer_fullname, "ООО Ромашка");
        assert_eq!(stored.fields.contact_person.as_deref(), Some("Петров"));
        assert_eq!(stored.fields.application_number, 5007);
    }

    #[test]
    fn test_unknown_stage_is_row_error() {
        let conn = conn();
        let mut p = processor();
        let row = record(3, &[("nid", "8"), ("field_etap_value", "13. Архив")]);
        let outcome = p.process(&conn, &row, &JobContext::new("job")).unwrap();
        assert!(matches!(outcome, RowOutcome::Failed(_)));
        assert!(ApplicationRepository::find_by_legacy_id_tx(&conn, 8).unwrap().is_none());
    }

    #[test]
    fn test_missing_customer_name() {
        let conn = conn();
        let mut p = processor();
        p.process(&conn, &record(2, &[("nid", "9")]), &JobContext::new("job"))
            .unwrap();
        let stored = ApplicationRepository::find_by_legacy_id_tx(&conn, 9).unwrap().unwrap();
        assert_eq!(stored.fields.customer_fullname, UNKNOWN_CUSTOMER);
        assert_eq!(stored.fields.status, "new");
    }
}
