// ==========================================
// 工单系统 - 旧系统用户处理器
// ==========================================
// 自然键: uid（uid=0 为匿名用户，跳过）
// 规则:
// - 姓名必填
// - 邮箱缺失 -> legacy_<uid>@placeholder.local；统一小写
// - 邮箱被其他账号占用 -> skipped + warning
// - status = "0" 为停用
// ==========================================

use crate::domain::records::UserFields;
use crate::domain::types::SourceType;
use crate::i18n::{t, t_with_args};
use crate::importer::column_mapper::UserColumnMapping;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::RawRecord;
use crate::importer::processors::{field, legacy_timestamp, missing, parse_key};
use crate::importer::row_processor::{JobContext, RowOutcome, RowProcessor};
use crate::repository::UserRepository;
use rusqlite::Connection;

const ANONYMOUS_UID: i64 = 0;

pub struct UserProcessor {
    mapping: UserColumnMapping,
}

impl UserProcessor {
    pub fn new(mapping: UserColumnMapping) -> Self {
        Self { mapping }
    }

    /// 两列取其一（前者优先）
    fn first_timestamp(
        record: &RawRecord,
        primary: &Option<String>,
        fallback: &Option<String>,
    ) -> Option<String> {
        legacy_timestamp(record, primary).or_else(|| legacy_timestamp(record, fallback))
    }
}

impl RowProcessor for UserProcessor {
    fn source_type(&self) -> SourceType {
        SourceType::Users
    }

    fn process(
        &mut self,
        conn: &Connection,
        record: &RawRecord,
        ctx: &JobContext,
    ) -> ImportResult<RowOutcome> {
        let m = &self.mapping;
        let uid = match parse_key(record, &m.uid, "uid") {
            Ok(uid) => uid,
            Err(outcome) => return Ok(outcome),
        };
        if uid == ANONYMOUS_UID {
            return Ok(RowOutcome::Skipped(t("users.anonymous")));
        }

        let Some(name) = field(record, &m.name) else {
            return Ok(missing("name"));
        };

        let email = field(record, &m.mail)
            .map(str::to_string)
            .unwrap_or_else(|| format!("legacy_{}@placeholder.local", uid))
            .to_lowercase();

        let fields = UserFields {
            email,
            full_name: name.to_string(),
            active: field(record, &m.status) != Some("0"),
            legacy_last_access: Self::first_timestamp(record, &m.last_access, &m.access),
            legacy_last_login: Self::first_timestamp(record, &m.last_login, &m.login),
        };

        // 邮箱唯一: 被其他账号（不同 uid 或手工账号）占用时跳过
        if let Some(owner) = UserRepository::find_by_email_tx(conn, &fields.email)? {
            if owner.legacy_uid != Some(uid) {
                return Ok(RowOutcome::Skipped(t_with_args(
                    "users.email_taken",
                    &[("name", name), ("email", &fields.email)],
                )));
            }
        }

        match UserRepository::find_by_legacy_uid_tx(conn, uid)? {
            Some(existing) if existing.fields == fields => Ok(RowOutcome::Unchanged),
            Some(existing) => {
                UserRepository::update_tx(conn, &existing.id, &fields)?;
                Ok(RowOutcome::Updated)
            }
            None => {
                let created_at = Self::first_timestamp(record, &m.created_at, &m.created);
                UserRepository::insert_tx(
                    conn,
                    uid,
                    &fields,
                    created_at.as_deref(),
                    &ctx.provenance(SourceType::Users),
                )?;
                Ok(RowOutcome::Imported)
            }
        }
    }
}
