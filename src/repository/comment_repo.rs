// ==========================================
// 工单系统 - 评论/附件数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::records::{CommentFields, FileFields, Provenance};
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

// ==========================================
// CommentRepository - 工单评论
// ==========================================
pub struct CommentRepository;

impl CommentRepository {
    /// 在事务中按旧系统 cid 查询评论
    pub fn find_by_legacy_id_tx(
        conn: &Connection,
        legacy_id: i64,
    ) -> RepositoryResult<Option<(String, CommentFields)>> {
        let found = conn
            .prepare_cached(
                r#"
                SELECT id, application_id, user_name, comment
                FROM application_comments
                WHERE legacy_id = ?1
                "#,
            )?
            .query_row(params![legacy_id], |row| {
                Ok((
                    row.get(0)?,
                    CommentFields {
                        application_id: row.get(1)?,
                        user_name: row.get(2)?,
                        comment: row.get(3)?,
                    },
                ))
            })
            .optional()?;
        Ok(found)
    }

    pub fn insert_tx(
        conn: &Connection,
        legacy_id: i64,
        fields: &CommentFields,
        created_at: &str,
        provenance: &Provenance,
    ) -> RepositoryResult<String> {
        let id = Uuid::new_v4().to_string();
        conn.execute(
            r#"
            INSERT INTO application_comments (
                id, legacy_id, application_id, user_name, comment, created_at,
                import_source, import_job_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                id,
                legacy_id,
                fields.application_id,
                fields.user_name,
                fields.comment,
                created_at,
                provenance.source,
                provenance.job_id,
            ],
        )?;
        Ok(id)
    }

    pub fn update_tx(conn: &Connection, id: &str, fields: &CommentFields) -> RepositoryResult<()> {
        conn.execute(
            r#"
            UPDATE application_comments
            SET application_id = ?2, user_name = ?3, comment = ?4
            WHERE id = ?1
            "#,
            params![id, fields.application_id, fields.user_name, fields.comment],
        )?;
        Ok(())
    }
}

// ==========================================
// FileRepository - 附件元数据
// ==========================================
pub struct FileRepository;

impl FileRepository {
    /// 在事务中按旧系统 fid 查询附件
    pub fn find_by_legacy_id_tx(
        conn: &Connection,
        legacy_id: i64,
    ) -> RepositoryResult<Option<(String, FileFields)>> {
        let found = conn
            .prepare_cached(
                r#"
                SELECT id, application_id, legacy_path, original_filename, stored_filename,
                       file_size, mime_type, description
                FROM application_files
                WHERE legacy_id = ?1
                "#,
            )?
            .query_row(params![legacy_id], |row| {
                Ok((
                    row.get(0)?,
                    FileFields {
                        application_id: row.get(1)?,
                        legacy_path: row.get(2)?,
                        original_filename: row.get(3)?,
                        stored_filename: row.get(4)?,
                        file_size: row.get(5)?,
                        mime_type: row.get(6)?,
                        description: row.get(7)?,
                    },
                ))
            })
            .optional()?;
        Ok(found)
    }

    pub fn insert_tx(
        conn: &Connection,
        legacy_id: i64,
        fields: &FileFields,
        uploaded_at: &str,
        provenance: &Provenance,
    ) -> RepositoryResult<String> {
        let id = Uuid::new_v4().to_string();
        conn.execute(
            r#"
            INSERT INTO application_files (
                id, legacy_id, legacy_path, application_id, original_filename,
                stored_filename, file_size, mime_type, description, uploaded_at,
                import_source, import_job_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                id,
                legacy_id,
                fields.legacy_path,
                fields.application_id,
                fields.original_filename,
                fields.stored_filename,
                fields.file_size,
                fields.mime_type,
                fields.description,
                uploaded_at,
                provenance.source,
                provenance.job_id,
            ],
        )?;
        Ok(id)
    }

    pub fn update_tx(conn: &Connection, id: &str, fields: &FileFields) -> RepositoryResult<()> {
        conn.execute(
            r#"
            UPDATE application_files SET
                application_id = ?2, legacy_path = ?3, original_filename = ?4,
                stored_filename = ?5, file_size = ?6, mime_type = ?7, description = ?8
            WHERE id = ?1
            "#,
            params![
                id,
                fields.application_id,
                fields.legacy_path,
                fields.original_filename,
                fields.stored_filename,
                fields.file_size,
                fields.mime_type,
                fields.description,
            ],
        )?;
        Ok(())
    }
}
