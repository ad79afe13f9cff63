// ==========================================
// 工单系统 - 物料目录处理器
// ==========================================
// 自然键: 物料 code；无 code 时按名称
// 规则:
// - 名称必填；单位标准化（缺省 шт）；价格与库存数量宽松解析（缺省 0）
// - 文件内同一键出现多次时只处理最后一次，其余行跳过
// - 已有物料: 覆盖名称/单位/价格/库存数量/分类，来源标记保持不变
// ==========================================

use crate::domain::records::MaterialRecord;
use crate::domain::types::SourceType;
use crate::importer::column_mapper::MaterialCatalogColumnMapping;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::{RawRecord, TabularFile};
use crate::importer::processors::{field, missing, LastOccurrence};
use crate::importer::row_processor::{JobContext, RowOutcome, RowProcessor};
use crate::repository::{NewMaterial, StockRepository};
use rusqlite::Connection;

pub struct MaterialCatalogProcessor {
    mapping: MaterialCatalogColumnMapping,
    last: LastOccurrence,
}

impl MaterialCatalogProcessor {
    /// # 参数
    /// - file: 待导入文件（预先扫描一遍确定每个键的最后出现行）
    /// - record_limit: 与提交器一致的行数限制
    pub fn new(
        mapping: MaterialCatalogColumnMapping,
        file: &TabularFile,
        record_limit: Option<usize>,
    ) -> ImportResult<Self> {
        let last = LastOccurrence::scan(file, record_limit, |record| {
            Self::key(&mapping, record).map(str::to_string)
        })?;
        Ok(Self { mapping, last })
    }

    fn key<'a>(mapping: &MaterialCatalogColumnMapping, record: &'a RawRecord) -> Option<&'a str> {
        field(record, &mapping.code).or_else(|| field(record, &mapping.name))
    }
}

impl RowProcessor for MaterialCatalogProcessor {
    fn source_type(&self) -> SourceType {
        SourceType::Materials
    }

    fn process(
        &mut self,
        conn: &Connection,
        record: &RawRecord,
        ctx: &JobContext,
    ) -> ImportResult<RowOutcome> {
        let m = &self.mapping;
        let Some(name) = field(record, &m.name) else {
            return Ok(missing("name"));
        };
        let code = field(record, &m.code);

        if let Some(outcome) = self.last.superseded(code.unwrap_or(name), record.row_number) {
            return Ok(outcome);
        }

        let unit = DataCleaner::normalize_unit(field(record, &m.unit));
        let price = field(record, &m.price)
            .and_then(DataCleaner::parse_number)
            .unwrap_or(0.0);
        let stock_quantity = field(record, &m.quantity)
            .and_then(DataCleaner::parse_number)
            .unwrap_or(0.0);
        let category = DataCleaner::detect_category(name);

        let existing = match code {
            Some(code) => StockRepository::find_material_by_code_tx(conn, code)?,
            None => StockRepository::find_material_by_name_tx(conn, name)?,
        };

        let Some(existing) = existing else {
            StockRepository::insert_material_tx(
                conn,
                &NewMaterial {
                    code,
                    name,
                    unit: &unit,
                    price,
                    stock_quantity,
                    category,
                },
                &ctx.provenance(SourceType::Materials),
            )?;
            return Ok(RowOutcome::Imported);
        };

        let refreshed = MaterialRecord {
            id: existing.id.clone(),
            code: code.map(str::to_string).or_else(|| existing.code.clone()),
            name: name.to_string(),
            unit,
            price,
            stock_quantity,
            category: category.map(str::to_string),
        };
        if refreshed == existing {
            return Ok(RowOutcome::Unchanged);
        }

        StockRepository::update_catalog_material_tx(conn, &refreshed)?;
        Ok(RowOutcome::Updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::column_mapper::ColumnMapping;
    use crate::importer::processors::test_support::{conn, csv};
    use rusqlite::params;

    /// 按提交器的方式逐行处理整个文件
    fn run(conn: &Connection, content: &str) -> Vec<RowOutcome> {
        let file = csv(content);
        let headers = file.headers().unwrap();
        let mapping = MaterialCatalogColumnMapping::auto_detect(&headers);
        let mut processor = MaterialCatalogProcessor::new(mapping, &file, None).unwrap();
        let ctx = JobContext::new("job-m");
        file.records()
            .unwrap()
            .map(|record| processor.process(conn, &record.unwrap(), &ctx).unwrap())
            .collect()
    }

    #[test]
    fn test_catalog_insert_defaults() {
        let conn = conn();
        let outcomes = run(
            &conn,
            "Код,Наименование,Ед.изм.,Цена,Остаток\nK-1,Кабель UTP 5e,метр,\"1 250,50\",300\n,Дюбель 6мм,,,\n",
        );
        assert_eq!(outcomes, vec![RowOutcome::Imported, RowOutcome::Imported]);

        let cable = StockRepository::find_material_by_code_tx(&conn, "K-1").unwrap().unwrap();
        assert_eq!(cable.unit, "м");
        assert_eq!(cable.price, 1250.5);
        assert_eq!(cable.stock_quantity, 300.0);
        assert_eq!(cable.category.as_deref(), Some("кабель"));

        let dowel = StockRepository::find_material_by_name_tx(&conn, "Дюбель 6мм").unwrap().unwrap();
        assert_eq!(dowel.code, None);
        assert_eq!(dowel.unit, "шт");
        assert_eq!(dowel.price, 0.0);
        assert_eq!(dowel.category.as_deref(), Some("крепёж"));

        let source: String = conn
            .query_row(
                "SELECT import_source FROM materials WHERE id = ?1",
                params![cable.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(source, "materials");
    }

    #[test]
    fn test_catalog_duplicate_key_last_row_wins() {
        let conn = conn();
        let outcomes = run(
            &conn,
            "Код,Наименование,Цена\nK-1,Старое имя,10\n,Хомут,1\nK-1,Новое имя,20\n,Хомут,2\n",
        );
        assert!(matches!(outcomes[0], RowOutcome::Skipped(_)));
        assert!(matches!(outcomes[1], RowOutcome::Skipped(_)));
        assert_eq!(outcomes[2], RowOutcome::Imported);
        assert_eq!(outcomes[3], RowOutcome::Imported);

        let material = StockRepository::find_material_by_code_tx(&conn, "K-1").unwrap().unwrap();
        assert_eq!(material.name, "Новое имя");
        assert_eq!(material.price, 20.0);
        let clamp = StockRepository::find_material_by_name_tx(&conn, "Хомут").unwrap().unwrap();
        assert_eq!(clamp.price, 2.0);
    }

    #[test]
    fn test_catalog_reimport_unchanged_then_updated() {
        let conn = conn();
        let content = "Наименование,Цена,Остаток\nРозетка RJ45,150,10\n";
        assert_eq!(run(&conn, content), vec![RowOutcome::Imported]);
        assert_eq!(run(&conn, content), vec![RowOutcome::Unchanged]);
        assert_eq!(
            run(&conn, "Наименование,Цена,Остаток\nРозетка RJ45,175,4\n"),
            vec![RowOutcome::Updated]
        );

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM materials", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        let socket = StockRepository::find_material_by_name_tx(&conn, "Розетка RJ45").unwrap().unwrap();
        assert_eq!(socket.price, 175.0);
        assert_eq!(socket.stock_quantity, 4.0);
    }

    #[test]
    fn test_catalog_nameless_row_skipped() {
        let conn = conn();
        let outcomes = run(&conn, "Код,Наименование,Цена\nK-9,,10\nK-10,Шкаф 19U,1\n");
        assert!(matches!(outcomes[0], RowOutcome::Skipped(_)));
        assert_eq!(outcomes[1], RowOutcome::Imported);
    }
}
