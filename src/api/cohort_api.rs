// ==========================================
// 工单系统 - 导入回滚API
// ==========================================
// 职责: 按分类统计/删除导入产生的记录
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ImportConfigReader;
use crate::domain::records::ReverseReport;
use crate::domain::types::CohortCategory;
use crate::importer::cohort::CohortReverser;
use crate::repository::CohortRepository;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// 标记记录统计
#[derive(Debug, Clone, Serialize)]
pub struct CohortCounts {
    pub counts: BTreeMap<String, u64>,
}

/// 回滚API
pub struct CohortApi {
    conn: Arc<Mutex<Connection>>,
    config: Arc<dyn ImportConfigReader>,
}

impl CohortApi {
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<dyn ImportConfigReader>) -> Self {
        Self { conn, config }
    }

    /// 各分类的标记记录数
    pub async fn counts(&self) -> ApiResult<CohortCounts> {
        let conn = self.conn.clone();
        let counts = tokio::task::spawn_blocking(move || {
            let repo = CohortRepository::from_connection(conn);
            CohortReverser::new(&repo, 1).counts()
        })
        .await
        .map_err(|e| ApiError::InternalError(format!("统计任务异常退出: {}", e)))??;

        Ok(CohortCounts { counts })
    }

    /// 删除指定分类的导入记录
    ///
    /// # 参数
    /// - category: orders / comments / files / users / stock / all
    ///
    /// # 返回
    /// - 部分失败时 report.error 非空，已删除的计数仍然返回
    pub async fn reverse(&self, category: &str) -> ApiResult<ReverseReport> {
        let category: CohortCategory = category.parse().map_err(ApiError::InvalidInput)?;
        let chunk_size = self
            .config
            .get_reverse_chunk_size()
            .await
            .map_err(|e| ApiError::InternalError(format!("读取回滚配置失败: {}", e)))?;

        let conn = self.conn.clone();
        let report = tokio::task::spawn_blocking(move || {
            let repo = CohortRepository::from_connection(conn);
            CohortReverser::new(&repo, chunk_size).reverse(category)
        })
        .await
        .map_err(|e| ApiError::InternalError(format!("回滚任务异常退出: {}", e)))?;

        match &report.error {
            None => info!(category = %category, deleted = ?report.deleted, "导入记录已回滚"),
            Some(error) => warn!(
                category = %category,
                deleted = ?report.deleted,
                error = %error,
                "导入记录回滚部分完成"
            ),
        }
        Ok(report)
    }
}
