// ==========================================
// 工单系统 - 配置管理器
// ==========================================
// 职责: 导入参数的加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)，当前仅使用 global scope
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取正整数配置，缺失或格式错误时使用默认值
    fn get_usize_or_default(&self, key: &str, default: usize) -> ConfigResult<usize> {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };

        match raw.trim().parse::<usize>() {
            Ok(value) if value > 0 => Ok(value),
            _ => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default,
                    "配置值格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::info!(config_key = key, value, "配置已更新");
        Ok(())
    }

    /// 获取导入相关配置的快照（含默认值）
    pub async fn get_import_snapshot(&self) -> ConfigResult<BTreeMap<&'static str, usize>> {
        let mut snapshot = BTreeMap::new();
        snapshot.insert(config_keys::DEFAULT_BATCH_SIZE, self.get_default_batch_size().await?);
        snapshot.insert(config_keys::MAX_BATCH_SIZE, self.get_max_batch_size().await?);
        snapshot.insert(config_keys::STREAM_BUFFER, self.get_stream_buffer().await?);
        snapshot.insert(config_keys::REVERSE_CHUNK_SIZE, self.get_reverse_chunk_size().await?);
        Ok(snapshot)
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_default_batch_size(&self) -> ConfigResult<usize> {
        self.get_usize_or_default(config_keys::DEFAULT_BATCH_SIZE, defaults::DEFAULT_BATCH_SIZE)
    }

    async fn get_max_batch_size(&self) -> ConfigResult<usize> {
        self.get_usize_or_default(config_keys::MAX_BATCH_SIZE, defaults::MAX_BATCH_SIZE)
    }

    async fn get_stream_buffer(&self) -> ConfigResult<usize> {
        self.get_usize_or_default(config_keys::STREAM_BUFFER, defaults::STREAM_BUFFER)
    }

    async fn get_reverse_chunk_size(&self) -> ConfigResult<usize> {
        self.get_usize_or_default(config_keys::REVERSE_CHUNK_SIZE, defaults::REVERSE_CHUNK_SIZE)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 批次
    pub const DEFAULT_BATCH_SIZE: &str = "import/default_batch_size";
    pub const MAX_BATCH_SIZE: &str = "import/max_batch_size";

    // 进度流
    pub const STREAM_BUFFER: &str = "import/stream_buffer";

    // 回滚
    pub const REVERSE_CHUNK_SIZE: &str = "import/reverse_chunk_size";
}

// ==========================================
// 默认值
// ==========================================
pub mod defaults {
    pub const DEFAULT_BATCH_SIZE: usize = 50;
    pub const MAX_BATCH_SIZE: usize = 1000;
    pub const STREAM_BUFFER: usize = 16;
    pub const REVERSE_CHUNK_SIZE: usize = 500;
}
