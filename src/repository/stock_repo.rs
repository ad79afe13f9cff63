// ==========================================
// 工单系统 - 物料/库存数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 表: warehouses, materials, warehouse_stocks
// 说明: 物料按 code 唯一（目录导入允许无 code）；库存行按 (warehouse_id, material_id) 唯一
// ==========================================

use crate::domain::records::{MaterialRecord, Provenance, StockRow};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// 新物料写入参数
#[derive(Debug, Clone, PartialEq)]
pub struct NewMaterial<'a> {
    pub code: Option<&'a str>,
    pub name: &'a str,
    pub unit: &'a str,
    pub price: f64,
    pub stock_quantity: f64,
    pub category: Option<&'a str>,
}

const MATERIAL_COLUMNS: &str = "id, code, name, unit, price, stock_quantity, category";

fn map_material(row: &rusqlite::Row<'_>) -> rusqlite::Result<MaterialRecord> {
    Ok(MaterialRecord {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        unit: row.get(3)?,
        price: row.get(4)?,
        stock_quantity: row.get(5)?,
        category: row.get(6)?,
    })
}

/// 物料/库存仓储
pub struct StockRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StockRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 仓库
    // ==========================================

    /// 创建仓库
    ///
    /// # 返回
    /// - 新仓库 id
    pub fn create_warehouse(&self, name: &str) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO warehouses (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![id, name, Utc::now().to_rfc3339()],
        )?;
        Ok(id)
    }

    pub fn warehouse_exists(&self, warehouse_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM warehouses WHERE id = ?1",
                params![warehouse_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    // ==========================================
    // 物料（只读，冲突检测用）
    // ==========================================

    /// 按编码批量查询物料名称
    ///
    /// # 返回
    /// - code -> name，仅包含库中已存在的编码
    pub fn find_names_by_codes(&self, codes: &[String]) -> RepositoryResult<HashMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare_cached("SELECT name FROM materials WHERE code = ?1")?;
        let mut names = HashMap::with_capacity(codes.len());

        for code in codes {
            let name: Option<String> = stmt
                .query_row(params![code], |row| row.get(0))
                .optional()?;
            if let Some(name) = name {
                names.insert(code.clone(), name);
            }
        }

        Ok(names)
    }

    pub fn find_material_by_code(&self, code: &str) -> RepositoryResult<Option<MaterialRecord>> {
        let conn = self.get_conn()?;
        Self::find_material_by_code_tx(&conn, code)
    }

    /// 查询某仓库的库存行
    pub fn list_stock(&self, warehouse_id: &str) -> RepositoryResult<Vec<StockRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT warehouse_id, material_id, quantity
            FROM warehouse_stocks
            WHERE warehouse_id = ?1
            ORDER BY material_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![warehouse_id], |row| {
                Ok(StockRow {
                    warehouse_id: row.get(0)?,
                    material_id: row.get(1)?,
                    quantity: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub fn find_material_by_code_tx(
        conn: &Connection,
        code: &str,
    ) -> RepositoryResult<Option<MaterialRecord>> {
        let sql = format!("SELECT {} FROM materials WHERE code = ?1", MATERIAL_COLUMNS);
        let material = conn
            .prepare_cached(&sql)?
            .query_row(params![code], map_material)
            .optional()?;
        Ok(material)
    }

    /// 按名称查找物料（同名多条时取最早创建的一条）
    pub fn find_material_by_name_tx(
        conn: &Connection,
        name: &str,
    ) -> RepositoryResult<Option<MaterialRecord>> {
        let sql = format!(
            "SELECT {} FROM materials WHERE name = ?1 ORDER BY created_at, rowid LIMIT 1",
            MATERIAL_COLUMNS
        );
        let material = conn
            .prepare_cached(&sql)?
            .query_row(params![name], map_material)
            .optional()?;
        Ok(material)
    }

    pub fn insert_material_tx(
        conn: &Connection,
        material: &NewMaterial<'_>,
        provenance: &Provenance,
    ) -> RepositoryResult<MaterialRecord> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO materials (
                id, code, name, unit, price, stock_quantity, category, last_import_at,
                created_at, updated_at, import_source, import_job_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?8, ?9, ?10)
            "#,
            params![
                id,
                material.code,
                material.name,
                material.unit,
                material.price,
                material.stock_quantity,
                material.category,
                now,
                provenance.source,
                provenance.job_id,
            ],
        )?;

        Ok(MaterialRecord {
            id,
            code: material.code.map(str::to_string),
            name: material.name.to_string(),
            unit: material.unit.to_string(),
            price: material.price,
            stock_quantity: material.stock_quantity,
            category: material.category.map(str::to_string),
        })
    }

    /// 更新已有物料（名称/单位/价格），来源标记保持不变
    pub fn update_material_tx(conn: &Connection, material: &MaterialRecord) -> RepositoryResult<()> {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            UPDATE materials
            SET name = ?2, unit = ?3, price = ?4, last_import_at = ?5, updated_at = ?5
            WHERE id = ?1
            "#,
            params![material.id, material.name, material.unit, material.price, now],
        )?;
        Ok(())
    }

    /// 目录导入覆盖物料字段（编码/名称/单位/价格/库存数量/分类），来源标记保持不变
    pub fn update_catalog_material_tx(
        conn: &Connection,
        material: &MaterialRecord,
    ) -> RepositoryResult<()> {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            UPDATE materials
            SET code = ?2, name = ?3, unit = ?4, price = ?5, stock_quantity = ?6,
                category = ?7, last_import_at = ?8, updated_at = ?8
            WHERE id = ?1
            "#,
            params![
                material.id,
                material.code,
                material.name,
                material.unit,
                material.price,
                material.stock_quantity,
                material.category,
                now,
            ],
        )?;
        Ok(())
    }

    pub fn find_stock_quantity_tx(
        conn: &Connection,
        warehouse_id: &str,
        material_id: &str,
    ) -> RepositoryResult<Option<f64>> {
        let quantity = conn
            .prepare_cached(
                "SELECT quantity FROM warehouse_stocks WHERE warehouse_id = ?1 AND material_id = ?2",
            )?
            .query_row(params![warehouse_id, material_id], |row| row.get(0))
            .optional()?;
        Ok(quantity)
    }

    pub fn insert_stock_tx(
        conn: &Connection,
        warehouse_id: &str,
        material_id: &str,
        quantity: f64,
        provenance: &Provenance,
    ) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO warehouse_stocks (
                warehouse_id, material_id, quantity, last_import_at, import_source, import_job_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                warehouse_id,
                material_id,
                quantity,
                Utc::now().to_rfc3339(),
                provenance.source,
                provenance.job_id,
            ],
        )?;
        Ok(())
    }

    /// 库存数量累加（不覆盖）
    pub fn add_stock_quantity_tx(
        conn: &Connection,
        warehouse_id: &str,
        material_id: &str,
        delta: f64,
    ) -> RepositoryResult<()> {
        conn.execute(
            r#"
            UPDATE warehouse_stocks
            SET quantity = quantity + ?3, last_import_at = ?4
            WHERE warehouse_id = ?1 AND material_id = ?2
            "#,
            params![warehouse_id, material_id, delta, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}
