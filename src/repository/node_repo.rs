// ==========================================
// 工单系统 - 网络节点数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 节点按 code 唯一
// ==========================================

use crate::domain::records::{ExistingNode, NodeFields, Provenance};
use crate::repository::error::RepositoryResult;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

pub struct NodeRepository;

impl NodeRepository {
    fn map_row(row: &Row<'_>) -> rusqlite::Result<ExistingNode> {
        Ok(ExistingNode {
            id: row.get(0)?,
            fields: NodeFields {
                address: row.get(1)?,
                location_details: row.get(2)?,
                comm_info: row.get(3)?,
                status: row.get(4)?,
                contract_link: row.get(5)?,
                node_created_date: row.get(6)?,
            },
        })
    }

    pub fn find_by_code_tx(conn: &Connection, code: &str) -> RepositoryResult<Option<ExistingNode>> {
        let node = conn
            .prepare_cached(
                r#"
                SELECT id, address, location_details, comm_info, status, contract_link, node_created_date
                FROM network_nodes
                WHERE code = ?1
                "#,
            )?
            .query_row(params![code], Self::map_row)
            .optional()?;
        Ok(node)
    }

    pub fn insert_tx(
        conn: &Connection,
        code: &str,
        fields: &NodeFields,
        provenance: &Provenance,
    ) -> RepositoryResult<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO network_nodes (
                id, code, address, location_details, comm_info, status, contract_link,
                node_created_date, created_at, updated_at, import_source, import_job_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, ?10, ?11)
            "#,
            params![
                id,
                code,
                fields.address,
                fields.location_details,
                fields.comm_info,
                fields.status,
                fields.contract_link,
                fields.node_created_date,
                now,
                provenance.source,
                provenance.job_id,
            ],
        )?;
        Ok(id)
    }

    pub fn update_tx(conn: &Connection, id: &str, fields: &NodeFields) -> RepositoryResult<()> {
        conn.execute(
            r#"
            UPDATE network_nodes SET
                address = ?2, location_details = ?3, comm_info = ?4, status = ?5,
                contract_link = ?6, node_created_date = ?7, updated_at = ?8
            WHERE id = ?1
            "#,
            params![
                id,
                fields.address,
                fields.location_details,
                fields.comm_info,
                fields.status,
                fields.contract_link,
                fields.node_created_date,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
