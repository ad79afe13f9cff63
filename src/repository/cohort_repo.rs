// ==========================================
// 工单系统 - 导入批次（来源标记）数据仓储
// ==========================================
// 职责: 按 import_source 统计 / 分块删除导入产生的记录
// 红线: 只删除带来源标记的记录（父工单级联删除的从属记录除外）
// 说明: 仍被其他来源（含手工）库存行引用的物料不删除，也不计入统计
// ==========================================

use crate::domain::types::{CohortCategory, SourceType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// 分类对应的 (表名, 来源标记)，按删除顺序排列
pub fn tagged_tables(category: CohortCategory) -> &'static [(&'static str, SourceType)] {
    match category {
        CohortCategory::Comments => &[("application_comments", SourceType::Comments)],
        CohortCategory::Files => &[("application_files", SourceType::Files)],
        CohortCategory::Orders => &[("applications", SourceType::Orders)],
        CohortCategory::Users => &[("users", SourceType::Users)],
        // 先删库存行，再删物料
        CohortCategory::Stock => &[
            ("warehouse_stocks", SourceType::WarehouseStock),
            ("materials", SourceType::WarehouseStock),
        ],
        CohortCategory::Materials => &[("materials", SourceType::Materials)],
        CohortCategory::Nodes => &[("network_nodes", SourceType::Nodes)],
        CohortCategory::All => &[],
    }
}

/// 表级附加删除条件（?1 为来源标记）
///
/// materials: 库存行外键为 ON DELETE CASCADE，被其他来源库存行引用的物料保留
fn retention_clause(table: &str) -> &'static str {
    match table {
        "materials" => {
            " AND NOT EXISTS (SELECT 1 FROM warehouse_stocks s \
             WHERE s.material_id = materials.id \
             AND (s.import_source IS NULL OR s.import_source <> ?1))"
        }
        _ => "",
    }
}

pub struct CohortRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CohortRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 统计某张表中可回滚的标记记录数
    pub fn count_tagged(&self, table: &str, source: SourceType) -> RepositoryResult<u64> {
        let conn = self.get_conn()?;
        // 表名来自 tagged_tables 常量，不接受外部输入
        let sql = format!(
            "SELECT COUNT(*) FROM {table} WHERE import_source = ?1{retain}",
            table = table,
            retain = retention_clause(table)
        );
        let count: i64 = conn.query_row(&sql, params![source.as_str()], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// 删除一块带标记的记录（独立事务提交）
    ///
    /// # 返回
    /// - 本块删除的行数；0 表示已删完
    pub fn delete_tagged_chunk(
        &self,
        table: &str,
        source: SourceType,
        chunk_size: usize,
    ) -> RepositoryResult<u64> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let sql = format!(
            "DELETE FROM {table} WHERE rowid IN (SELECT rowid FROM {table} WHERE import_source = ?1{retain} LIMIT ?2)",
            table = table,
            retain = retention_clause(table)
        );
        let deleted = tx.execute(&sql, params![source.as_str(), chunk_size as i64])?;
        tx.commit()?;
        Ok(deleted as u64)
    }
}
