// ==========================================
// 工单系统 - 用户数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 导入的用户一律 role=engineer, password_hash=NEEDS_RESET
// ==========================================

use crate::domain::records::{ExistingUser, Provenance, UserFields};
use crate::repository::error::RepositoryResult;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

/// 导入用户的默认角色
pub const IMPORTED_USER_ROLE: &str = "engineer";

/// 导入用户的密码占位（首次登录强制重置）
pub const PASSWORD_RESET_MARKER: &str = "NEEDS_RESET";

pub struct UserRepository;

impl UserRepository {
    fn map_row(row: &Row<'_>) -> rusqlite::Result<ExistingUser> {
        Ok(ExistingUser {
            id: row.get(0)?,
            legacy_uid: row.get(1)?,
            fields: UserFields {
                email: row.get(2)?,
                full_name: row.get(3)?,
                active: row.get::<_, i64>(4)? != 0,
                legacy_last_access: row.get(5)?,
                legacy_last_login: row.get(6)?,
            },
        })
    }

    pub fn find_by_legacy_uid_tx(
        conn: &Connection,
        legacy_uid: i64,
    ) -> RepositoryResult<Option<ExistingUser>> {
        let user = conn
            .prepare_cached(
                r#"
                SELECT id, legacy_uid, email, full_name, active, legacy_last_access, legacy_last_login
                FROM users
                WHERE legacy_uid = ?1
                "#,
            )?
            .query_row(params![legacy_uid], Self::map_row)
            .optional()?;
        Ok(user)
    }

    /// 按邮箱查询（邮箱已统一转小写）
    pub fn find_by_email_tx(conn: &Connection, email: &str) -> RepositoryResult<Option<ExistingUser>> {
        let user = conn
            .prepare_cached(
                r#"
                SELECT id, legacy_uid, email, full_name, active, legacy_last_access, legacy_last_login
                FROM users
                WHERE email = ?1
                "#,
            )?
            .query_row(params![email], Self::map_row)
            .optional()?;
        Ok(user)
    }

    pub fn insert_tx(
        conn: &Connection,
        legacy_uid: i64,
        fields: &UserFields,
        created_at: Option<&str>,
        provenance: &Provenance,
    ) -> RepositoryResult<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO users (
                id, legacy_uid, email, full_name, phone, role, password_hash, active,
                legacy_last_access, legacy_last_login, created_at, updated_at,
                import_source, import_job_id
            ) VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                id,
                legacy_uid,
                fields.email,
                fields.full_name,
                IMPORTED_USER_ROLE,
                PASSWORD_RESET_MARKER,
                fields.active as i64,
                fields.legacy_last_access,
                fields.legacy_last_login,
                created_at.unwrap_or(&now),
                now,
                provenance.source,
                provenance.job_id,
            ],
        )?;
        Ok(id)
    }

    pub fn update_tx(conn: &Connection, id: &str, fields: &UserFields) -> RepositoryResult<()> {
        conn.execute(
            r#"
            UPDATE users SET
                email = ?2, full_name = ?3, active = ?4,
                legacy_last_access = ?5, legacy_last_login = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
            params![
                id,
                fields.email,
                fields.full_name,
                fields.active as i64,
                fields.legacy_last_access,
                fields.legacy_last_login,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
