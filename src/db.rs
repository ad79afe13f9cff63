// ==========================================
// 工单系统 - SQLite 连接初始化与建库
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 统一建库脚本，导入产生的记录均带来源标记 import_source / import_job_id
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 建库脚本（幂等）
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_scope (
    scope_id TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(scope_type, scope_key)
);

INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
VALUES ('global', 'GLOBAL', 'global');

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    legacy_uid INTEGER UNIQUE,
    email TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    phone TEXT,
    role TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    legacy_last_access TEXT,
    legacy_last_login TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    import_source TEXT,
    import_job_id TEXT
);

CREATE TABLE IF NOT EXISTS applications (
    id TEXT PRIMARY KEY,
    legacy_id INTEGER UNIQUE,
    legacy_stage TEXT,
    legacy_body TEXT,
    application_number INTEGER NOT NULL,
    customer_type TEXT NOT NULL,
    customer_fullname TEXT NOT NULL,
    customer_phone TEXT NOT NULL DEFAULT '',
    contact_person TEXT,
    contact_phone TEXT,
    service_type TEXT NOT NULL,
    status TEXT NOT NULL,
    urgency TEXT NOT NULL,
    street_and_house TEXT,
    address_details TEXT,
    address_match_status TEXT NOT NULL DEFAULT 'unmatched',
    client_comment TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    import_source TEXT,
    import_job_id TEXT
);

CREATE TABLE IF NOT EXISTS application_comments (
    id TEXT PRIMARY KEY,
    legacy_id INTEGER UNIQUE,
    application_id TEXT NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
    user_name TEXT NOT NULL,
    comment TEXT NOT NULL,
    created_at TEXT NOT NULL,
    import_source TEXT,
    import_job_id TEXT
);

CREATE TABLE IF NOT EXISTS application_files (
    id TEXT PRIMARY KEY,
    legacy_id INTEGER UNIQUE,
    legacy_path TEXT,
    application_id TEXT NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
    original_filename TEXT NOT NULL,
    stored_filename TEXT NOT NULL,
    file_size INTEGER NOT NULL DEFAULT 0,
    mime_type TEXT NOT NULL,
    description TEXT,
    uploaded_at TEXT NOT NULL,
    import_source TEXT,
    import_job_id TEXT
);

CREATE TABLE IF NOT EXISTS application_logs (
    id TEXT PRIMARY KEY,
    application_id TEXT NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
    action TEXT NOT NULL,
    message TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS warehouses (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS materials (
    id TEXT PRIMARY KEY,
    code TEXT UNIQUE,
    name TEXT NOT NULL,
    unit TEXT NOT NULL DEFAULT 'шт',
    price REAL NOT NULL DEFAULT 0,
    stock_quantity REAL NOT NULL DEFAULT 0,
    category TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    last_import_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    import_source TEXT,
    import_job_id TEXT
);

CREATE TABLE IF NOT EXISTS warehouse_stocks (
    warehouse_id TEXT NOT NULL REFERENCES warehouses(id) ON DELETE CASCADE,
    material_id TEXT NOT NULL REFERENCES materials(id) ON DELETE CASCADE,
    quantity REAL NOT NULL DEFAULT 0,
    last_import_at TEXT,
    import_source TEXT,
    import_job_id TEXT,
    PRIMARY KEY (warehouse_id, material_id)
);

CREATE TABLE IF NOT EXISTS network_nodes (
    id TEXT PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    address TEXT NOT NULL,
    location_details TEXT,
    comm_info TEXT,
    status TEXT NOT NULL DEFAULT 'existing',
    contract_link TEXT,
    node_created_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    import_source TEXT,
    import_job_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_materials_name ON materials(name);
CREATE INDEX IF NOT EXISTS idx_users_import_source ON users(import_source);
CREATE INDEX IF NOT EXISTS idx_applications_import_source ON applications(import_source);
CREATE INDEX IF NOT EXISTS idx_comments_import_source ON application_comments(import_source);
CREATE INDEX IF NOT EXISTS idx_files_import_source ON application_files(import_source);
CREATE INDEX IF NOT EXISTS idx_materials_import_source ON materials(import_source);
CREATE INDEX IF NOT EXISTS idx_stocks_import_source ON warehouse_stocks(import_source);
CREATE INDEX IF NOT EXISTS idx_nodes_import_source ON network_nodes(import_source);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启（级联删除依赖它）
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建库（幂等），并写入当前 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
