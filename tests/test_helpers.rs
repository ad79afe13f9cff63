// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试文件生成、进度帧收集等功能
// ==========================================

#![allow(dead_code)]

use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use zakaz_import::api::{ImportStream, UploadedFile};
use zakaz_import::app::AppState;
use zakaz_import::db::{init_schema, open_sqlite_connection};
use zakaz_import::domain::ProgressFrame;
use zakaz_import::repository::StockRepository;

/// 库存文件表头
pub const STOCK_HEADER: &str = "Код,Наименование,Ед.изм,Цена,Остаток";

/// 旧系统工单导出表头（TSV）
pub const ORDERS_HEADER: &str =
    "nid\tfield_etap_value\tfield_all_fio_value\tfield_all_company_value\tfield_all_phone1_value";

/// 旧系统用户导出表头（TSV）
pub const USERS_HEADER: &str = "uid\tname\tmail\tstatus";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是合法 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接（与 AppState 共用，便于直接查库断言）
pub fn open_shared(db_path: &str) -> Arc<Mutex<Connection>> {
    let conn = open_sqlite_connection(db_path).expect("打开测试数据库失败");
    Arc::new(Mutex::new(conn))
}

/// 基于临时数据库构建完整应用状态
///
/// # 返回
/// - NamedTempFile: 需要保持存活
/// - Arc<AppState>: 应用状态
/// - Arc<Mutex<Connection>>: 与应用状态共享的连接
pub fn test_state() -> (NamedTempFile, Arc<AppState>, Arc<Mutex<Connection>>) {
    let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_shared(&db_path);
    let state = AppState::from_connection(db_path, conn.clone()).expect("初始化AppState失败");
    (temp_file, Arc::new(state), conn)
}

/// 创建仓库
pub fn create_warehouse(conn: &Arc<Mutex<Connection>>, name: &str) -> String {
    StockRepository::from_connection(conn.clone())
        .create_warehouse(name)
        .expect("创建仓库失败")
}

/// 查询单个计数
pub fn count(conn: &Arc<Mutex<Connection>>, sql: &str) -> i64 {
    conn.lock()
        .unwrap()
        .query_row(sql, [], |row| row.get(0))
        .unwrap_or_else(|e| panic!("查询失败 {}: {}", sql, e))
}

// ==========================================
// 测试文件生成
// ==========================================

/// 库存 CSV: (code, name, quantity)
pub fn stock_csv(rows: &[(&str, &str, &str)]) -> String {
    let mut content = format!("{}\n", STOCK_HEADER);
    for (code, name, quantity) in rows {
        content.push_str(&format!("{},{},шт,100,{}\n", code, name, quantity));
    }
    content
}

/// 生成 n 行库存数据（编码 M-001 ...）
pub fn numbered_stock_rows(n: usize) -> Vec<(String, String, String)> {
    (1..=n)
        .map(|i| (format!("M-{:03}", i), format!("Материал {}", i), format!("{}", i)))
        .collect()
}

pub fn stock_csv_owned(rows: &[(String, String, String)]) -> String {
    let borrowed: Vec<(&str, &str, &str)> = rows
        .iter()
        .map(|(c, n, q)| (c.as_str(), n.as_str(), q.as_str()))
        .collect();
    stock_csv(&borrowed)
}

/// 旧系统工单 TSV: (nid, stage, fio)
pub fn orders_tsv(rows: &[(i64, &str, &str)]) -> String {
    let mut content = format!("{}\n", ORDERS_HEADER);
    for (nid, stage, fio) in rows {
        content.push_str(&format!("{}\t{}\t{}\t\t+7 900 000-00-{:02}\n", nid, stage, fio, nid % 100));
    }
    content
}

/// 旧系统用户 TSV: (uid, name, mail)
pub fn users_tsv(rows: &[(i64, &str, &str)]) -> String {
    let mut content = format!("{}\n", USERS_HEADER);
    for (uid, name, mail) in rows {
        content.push_str(&format!("{}\t{}\t{}\t1\n", uid, name, mail));
    }
    content
}

pub fn upload(name: &str, content: &str) -> UploadedFile {
    UploadedFile::new(name, content.as_bytes().to_vec())
}

// ==========================================
// 进度帧
// ==========================================

/// 读取全部进度帧（直到发送端关闭）
pub async fn collect_frames(stream: ImportStream) -> Vec<ProgressFrame> {
    let mut frames = Vec::new();
    let mut rx = stream.frames;
    while let Some(frame) = rx.recv().await {
        frames.push(frame);
    }
    frames
}

/// 终止帧（断言恰好一个且为最后一帧）
pub fn done_frame(frames: &[ProgressFrame]) -> &ProgressFrame {
    assert_eq!(
        frames.iter().filter(|f| f.is_done()).count(),
        1,
        "应该恰好有一个终止帧"
    );
    let last = frames.last().expect("没有收到任何帧");
    assert!(last.is_done(), "终止帧必须是最后一帧");
    last
}

/// 带统计快照的批次帧（不含终止帧）的 current 序列
pub fn batch_currents(frames: &[ProgressFrame]) -> Vec<u64> {
    frames
        .iter()
        .filter(|f| f.stats.is_some())
        .map(|f| f.current)
        .collect()
}

/// current 单调不减
pub fn assert_monotonic(frames: &[ProgressFrame]) {
    let mut previous = 0;
    for frame in frames {
        assert!(
            frame.current >= previous,
            "current 回退: {} -> {}",
            previous,
            frame.current
        );
        assert!(frame.current <= frame.total, "current 超过 total");
        previous = frame.current;
    }
}
