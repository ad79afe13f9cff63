// ==========================================
// 工单系统 - 工单数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: *_tx 函数在调用方的事务/保存点内执行
// ==========================================

use crate::domain::records::{ApplicationFields, ExistingApplication, Provenance};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// 工单仓储
/// 职责: 管理 applications 表
pub struct ApplicationRepository {
    conn: Arc<Mutex<Connection>>,
}

/// 正文统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyCounts {
    pub with_body: u64,
    pub total_legacy: u64,
}

impl ApplicationRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按旧系统 ID 查询工单
    pub fn find_by_legacy_id(&self, legacy_id: i64) -> RepositoryResult<Option<ExistingApplication>> {
        let conn = self.get_conn()?;
        Self::find_by_legacy_id_tx(&conn, legacy_id)
    }

    /// 旧系统工单中已有正文的数量
    pub fn count_bodies(&self) -> RepositoryResult<BodyCounts> {
        let conn = self.get_conn()?;
        let (with_body, total_legacy): (i64, i64) = conn.query_row(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN legacy_body IS NOT NULL AND legacy_body <> '' THEN 1 ELSE 0 END), 0),
                COUNT(*)
            FROM applications
            WHERE legacy_id IS NOT NULL
            "#,
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(BodyCounts {
            with_body: with_body as u64,
            total_legacy: total_legacy as u64,
        })
    }

    /// 在事务中按旧系统 ID 查询工单
    pub fn find_by_legacy_id_tx(
        conn: &Connection,
        legacy_id: i64,
    ) -> RepositoryResult<Option<ExistingApplication>> {
        let mut stmt = conn.prepare_cached(
            r#"
            SELECT
                id, legacy_stage, application_number, customer_type, customer_fullname,
                customer_phone, contact_person, contact_phone, service_type, status,
                urgency, street_and_house, address_details, client_comment, legacy_body
            FROM applications
            WHERE legacy_id = ?1
            "#,
        )?;

        let existing = stmt
            .query_row(params![legacy_id], |row| {
                Ok(ExistingApplication {
                    id: row.get(0)?,
                    fields: ApplicationFields {
                        legacy_stage: row.get(1)?,
                        application_number: row.get(2)?,
                        customer_type: row.get(3)?,
                        customer_fullname: row.get(4)?,
                        customer_phone: row.get(5)?,
                        contact_person: row.get(6)?,
                        contact_phone: row.get(7)?,
                        service_type: row.get(8)?,
                        status: row.get(9)?,
                        urgency: row.get(10)?,
                        street_and_house: row.get(11)?,
                        address_details: row.get(12)?,
                        client_comment: row.get(13)?,
                    },
                    legacy_body: row.get(14)?,
                })
            })
            .optional()?;

        Ok(existing)
    }

    /// 在事务中插入工单（带来源标记）
    ///
    /// # 返回
    /// - 新工单 id
    pub fn insert_tx(
        conn: &Connection,
        legacy_id: i64,
        fields: &ApplicationFields,
        created_at: Option<&str>,
        provenance: &Provenance,
    ) -> RepositoryResult<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO applications (
                id, legacy_id, legacy_stage, application_number, customer_type,
                customer_fullname, customer_phone, contact_person, contact_phone,
                service_type, status, urgency, street_and_house, address_details,
                address_match_status, client_comment, created_at, updated_at,
                import_source, import_job_id
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                'unmatched', ?15, ?16, ?17, ?18, ?19
            )
            "#,
            params![
                id,
                legacy_id,
                fields.legacy_stage,
                fields.application_number,
                fields.customer_type,
                fields.customer_fullname,
                fields.customer_phone,
                fields.contact_person,
                fields.contact_phone,
                fields.service_type,
                fields.status,
                fields.urgency,
                fields.street_and_house,
                fields.address_details,
                fields.client_comment,
                created_at.unwrap_or(&now),
                now,
                provenance.source,
                provenance.job_id,
            ],
        )?;

        Ok(id)
    }

    /// 在事务中覆盖映射字段（来源标记保持不变）
    pub fn update_fields_tx(
        conn: &Connection,
        id: &str,
        fields: &ApplicationFields,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            r#"
            UPDATE applications SET
                legacy_stage = ?2, application_number = ?3, customer_type = ?4,
                customer_fullname = ?5, customer_phone = ?6, contact_person = ?7,
                contact_phone = ?8, service_type = ?9, status = ?10, urgency = ?11,
                street_and_house = ?12, address_details = ?13, client_comment = ?14,
                updated_at = ?15
            WHERE id = ?1
            "#,
            params![
                id,
                fields.legacy_stage,
                fields.application_number,
                fields.customer_type,
                fields.customer_fullname,
                fields.customer_phone,
                fields.contact_person,
                fields.contact_phone,
                fields.service_type,
                fields.status,
                fields.urgency,
                fields.street_and_house,
                fields.address_details,
                fields.client_comment,
                Utc::now().to_rfc3339(),
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Application".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// 在事务中更新旧系统正文
    pub fn update_body_tx(conn: &Connection, id: &str, body: &str) -> RepositoryResult<()> {
        conn.execute(
            "UPDATE applications SET legacy_body = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, body, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// 在事务中按旧系统 ID 查询工单 id（评论/附件挂接父工单用）
    pub fn find_id_by_legacy_id_tx(conn: &Connection, legacy_id: i64) -> RepositoryResult<Option<String>> {
        let id = conn
            .prepare_cached("SELECT id FROM applications WHERE legacy_id = ?1")?
            .query_row(params![legacy_id], |row| row.get(0))
            .optional()?;
        Ok(id)
    }
}
