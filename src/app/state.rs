// ==========================================
// 工单系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 所有 API 共享同一个 SQLite 连接（Mutex 保护，按批次事务持有）
// ==========================================

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{CohortApi, ImportApi};
use crate::config::config_manager::ConfigManager;
use crate::config::ImportConfigReader;
use crate::db::{init_schema, open_sqlite_connection};
use crate::importer::stage_mapper::StageTable;

/// 应用状态
///
/// 包含所有API实例和共享资源
/// 在 axum 路由中以 `Arc<AppState>` 共享
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 导入API
    pub import_api: Arc<ImportApi>,

    /// 回滚API
    pub cohort_api: Arc<CohortApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（":memory:" 用于测试）
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 创建数据库目录并打开连接
    /// 2. 建库（幂等）
    /// 3. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        if db_path != ":memory:" {
            if let Some(parent) = Path::new(&db_path).parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("无法创建数据库目录 {}: {}", parent.display(), e))?;
            }
        }

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("建库失败: {}", e))?;

        Self::from_connection(db_path, Arc::new(Mutex::new(conn)))
    }

    /// 基于已有连接创建（连接需已建库）
    pub fn from_connection(db_path: String, conn: Arc<Mutex<Connection>>) -> Result<Self, String> {
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法初始化配置管理器: {}", e))?,
        );
        let config: Arc<dyn ImportConfigReader> = config_manager.clone();

        // 阶段映射表只构建一次
        let stages = Arc::new(StageTable::legacy());
        tracing::debug!(stages = stages.len(), "阶段映射表已加载");

        let import_api = Arc::new(ImportApi::new(conn.clone(), stages, config.clone()));
        let cohort_api = Arc::new(CohortApi::new(conn, config));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            import_api,
            cohort_api,
            config_manager,
        })
    }
}
