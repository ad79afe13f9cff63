// ==========================================
// 工单系统 - 仓库库存处理器
// ==========================================
// 自然键: 物料 code
// 规则:
// - 新物料: 单位标准化（缺省 шт）、价格宽松解析（缺省 0）、按名称识别分类
// - 已有物料: 名称按冲突策略处理；单位/价格仅在列已映射且非空时刷新
// - 库存数量累加到 (仓库, 物料) 行；无该行时新建并打来源标记
// ==========================================

use crate::domain::records::MaterialRecord;
use crate::domain::types::{ConflictPolicy, SourceType};
use crate::i18n::t_with_args;
use crate::importer::column_mapper::StockColumnMapping;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::RawRecord;
use crate::importer::processors::{field, missing};
use crate::importer::row_processor::{JobContext, RowOutcome, RowProcessor};
use crate::repository::{NewMaterial, StockRepository};
use rusqlite::Connection;

pub struct StockProcessor {
    warehouse_id: String,
    mapping: StockColumnMapping,
    policy: ConflictPolicy,
}

impl StockProcessor {
    /// # 参数
    /// - warehouse_id: 目标仓库（调用方已确认存在）
    /// - policy: 名称冲突处理策略
    pub fn new(warehouse_id: impl Into<String>, mapping: StockColumnMapping, policy: ConflictPolicy) -> Self {
        Self {
            warehouse_id: warehouse_id.into(),
            mapping,
            policy,
        }
    }

    /// 按文件内容刷新已有物料
    ///
    /// # 返回
    /// - true: 有字段被修改
    fn refresh_material(
        &self,
        material: &mut MaterialRecord,
        name: &str,
        unit: Option<&str>,
        price: Option<f64>,
    ) -> bool {
        let mut changed = false;

        if self.policy == ConflictPolicy::OverwriteFromSource && material.name != name {
            material.name = name.to_string();
            changed = true;
        }

        if let Some(unit) = unit {
            let unit = DataCleaner::normalize_unit(Some(unit));
            if material.unit != unit {
                material.unit = unit;
                changed = true;
            }
        }

        if let Some(price) = price {
            if material.price != price {
                material.price = price;
                changed = true;
            }
        }

        changed
    }
}

impl RowProcessor for StockProcessor {
    fn source_type(&self) -> SourceType {
        SourceType::WarehouseStock
    }

    fn process(
        &mut self,
        conn: &Connection,
        record: &RawRecord,
        ctx: &JobContext,
    ) -> ImportResult<RowOutcome> {
        let m = &self.mapping;
        let Some(code) = field(record, &m.code) else {
            return Ok(missing("code"));
        };
        let Some(name) = field(record, &m.name) else {
            return Ok(missing("name"));
        };
        let Some(raw_quantity) = field(record, &m.quantity) else {
            return Ok(missing("quantity"));
        };
        let Some(quantity) = DataCleaner::parse_number(raw_quantity) else {
            return Ok(RowOutcome::Skipped(t_with_args(
                "stock.invalid_quantity",
                &[("value", raw_quantity)],
            )));
        };

        let unit = field(record, &m.unit);
        let price = field(record, &m.price).and_then(DataCleaner::parse_number);
        let provenance = ctx.provenance(SourceType::WarehouseStock);

        let Some(mut material) = StockRepository::find_material_by_code_tx(conn, code)? else {
            let unit = DataCleaner::normalize_unit(unit);
            let material = StockRepository::insert_material_tx(
                conn,
                &NewMaterial {
                    code: Some(code),
                    name,
                    unit: &unit,
                    price: price.unwrap_or(0.0),
                    stock_quantity: 0.0,
                    category: DataCleaner::detect_category(name),
                },
                &provenance,
            )?;
            StockRepository::insert_stock_tx(conn, &self.warehouse_id, &material.id, quantity, &provenance)?;
            return Ok(RowOutcome::Imported);
        };

        let mut changed = self.refresh_material(&mut material, name, unit, price);
        if changed {
            StockRepository::update_material_tx(conn, &material)?;
        }

        match StockRepository::find_stock_quantity_tx(conn, &self.warehouse_id, &material.id)? {
            Some(_) if quantity == 0.0 => {}
            Some(_) => {
                StockRepository::add_stock_quantity_tx(conn, &self.warehouse_id, &material.id, quantity)?;
                changed = true;
            }
            None => {
                StockRepository::insert_stock_tx(conn, &self.warehouse_id, &material.id, quantity, &provenance)?;
                changed = true;
            }
        }

        Ok(if changed {
            RowOutcome::Updated
        } else {
            RowOutcome::Unchanged
        })
    }
}
