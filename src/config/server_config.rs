// ==========================================
// 工单系统 - 服务启动配置
// ==========================================
// 来源: 环境变量
// - ZAKAZ_IMPORT_BIND: 监听地址（默认 127.0.0.1:8080）
// - ZAKAZ_IMPORT_DB_PATH: SQLite 文件路径（默认 <data_dir>/zakaz-import/zakaz.db）
// - ZAKAZ_IMPORT_LOCALE: 导入日志语言（默认 ru）
// ==========================================

use crate::i18n::DEFAULT_LOCALE;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const BIND_ENV: &str = "ZAKAZ_IMPORT_BIND";
pub const DB_PATH_ENV: &str = "ZAKAZ_IMPORT_DB_PATH";
pub const LOCALE_ENV: &str = "ZAKAZ_IMPORT_LOCALE";

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
const APP_DIR_NAME: &str = "zakaz-import";
const DB_FILE_NAME: &str = "zakaz.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub locale: String,
}

impl ServerConfig {
    /// 从环境变量加载
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载（便于测试）
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_raw = non_empty(BIND_ENV).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| format!("{} 无效 ({}): {}", BIND_ENV, bind_raw, e))?;

        let db_path = non_empty(DB_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let locale = non_empty(LOCALE_ENV).unwrap_or_else(|| DEFAULT_LOCALE.to_string());

        Ok(Self {
            bind,
            db_path,
            locale,
        })
    }
}

/// 默认数据库路径（系统数据目录不可用时退回当前目录）
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(DB_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DB_FILE_NAME))
}
