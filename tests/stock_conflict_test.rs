// ==========================================
// 库存导入与名称冲突集成测试
// ==========================================
// 覆盖: 冲突检测只读、冲突策略、库存累加、无表头文件
// ==========================================

mod test_helpers;

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use test_helpers::*;
use zakaz_import::api::{ConflictCheckRequest, StockImportRequest};
use zakaz_import::app::AppState;
use zakaz_import::domain::types::ConflictPolicy;
use zakaz_import::logging;
use zakaz_import::repository::StockRepository;

/// 10 个物料，其中 M-002 / M-005 / M-009 在第二份文件中改名
fn renamed_rows() -> Vec<(String, String, String)> {
    numbered_stock_rows(10)
        .into_iter()
        .map(|(code, name, qty)| match code.as_str() {
            "M-002" | "M-005" | "M-009" => (code.clone(), format!("{} (новое)", name), qty),
            _ => (code, name, qty),
        })
        .collect()
}

async fn seed(state: &AppState, warehouse_id: &str) {
    let req = StockImportRequest {
        warehouse_id: warehouse_id.to_string(),
        file: Some(upload("stock.csv", &stock_csv_owned(&numbered_stock_rows(10)))),
        ..Default::default()
    };
    let frames = collect_frames(state.import_api.start_stock_import(req).await.unwrap()).await;
    assert_eq!(done_frame(&frames).stats.as_ref().unwrap()["stock"].imported, 10);
}

fn material_name(conn: &Arc<Mutex<Connection>>, code: &str) -> String {
    StockRepository::from_connection(conn.clone())
        .find_material_by_code(code)
        .unwrap()
        .map(|m| m.name)
        .unwrap_or_default()
}

#[tokio::test]
async fn test_detects_three_of_ten_conflicts() {
    logging::init_test();
    let (_temp, state, conn) = test_state();
    let warehouse_id = create_warehouse(&conn, "Основной склад");
    seed(&state, &warehouse_id).await;

    let mut rows = renamed_rows();
    rows.push(("M-011".to_string(), "Новый материал".to_string(), "1".to_string()));

    let report = state
        .import_api
        .check_conflicts(ConflictCheckRequest {
            warehouse_id: warehouse_id.clone(),
            file: Some(upload("stock.csv", &stock_csv_owned(&rows))),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(report.total, 11);
    assert_eq!(report.existing_materials, 10);
    assert_eq!(report.new_materials, 1);
    let codes: Vec<&str> = report.conflicts.iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes, vec!["M-002", "M-005", "M-009"]);
    assert_eq!(report.conflicts[0].existing_name, "Материал 2");
    assert_eq!(report.conflicts[0].new_name, "Материал 2 (новое)");

    // 只读: 库中名称与物料数不变
    assert_eq!(material_name(&conn, "M-002"), "Материал 2");
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM materials"), 10);
}

#[tokio::test]
async fn test_keep_existing_names_by_default() {
    logging::init_test();
    let (_temp, state, conn) = test_state();
    let warehouse_id = create_warehouse(&conn, "Склад");
    seed(&state, &warehouse_id).await;

    let req = StockImportRequest {
        warehouse_id: warehouse_id.clone(),
        file: Some(upload("stock.csv", &stock_csv_owned(&renamed_rows()))),
        ..Default::default()
    };
    collect_frames(state.import_api.start_stock_import(req).await.unwrap()).await;

    assert_eq!(material_name(&conn, "M-005"), "Материал 5");

    // 数量累加: M-005 两次各 5
    let quantity: f64 = conn
        .lock()
        .unwrap()
        .query_row(
            r#"
            SELECT s.quantity FROM warehouse_stocks s
            JOIN materials m ON m.id = s.material_id
            WHERE m.code = 'M-005' AND s.warehouse_id = ?1
            "#,
            [&warehouse_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(quantity, 10.0);
}

#[tokio::test]
async fn test_overwrite_policy_renames_conflicting_materials() {
    logging::init_test();
    let (_temp, state, conn) = test_state();
    let warehouse_id = create_warehouse(&conn, "Склад");
    seed(&state, &warehouse_id).await;

    let req = StockImportRequest {
        warehouse_id: warehouse_id.clone(),
        file: Some(upload("stock.csv", &stock_csv_owned(&renamed_rows()))),
        conflict_resolution: Some(ConflictPolicy::OverwriteFromSource),
        ..Default::default()
    };
    collect_frames(state.import_api.start_stock_import(req).await.unwrap()).await;

    assert_eq!(material_name(&conn, "M-002"), "Материал 2 (новое)");
    assert_eq!(material_name(&conn, "M-009"), "Материал 9 (новое)");
    assert_eq!(material_name(&conn, "M-001"), "Материал 1");
}

#[tokio::test]
async fn test_update_names_alias_and_explicit_policy_wins() {
    logging::init_test();
    let (_temp, state, conn) = test_state();
    let warehouse_id = create_warehouse(&conn, "Склад");
    seed(&state, &warehouse_id).await;

    // 显式策略优先于 updateNames
    let req = StockImportRequest {
        warehouse_id: warehouse_id.clone(),
        file: Some(upload("stock.csv", &stock_csv_owned(&renamed_rows()))),
        conflict_resolution: Some(ConflictPolicy::KeepExisting),
        update_names: Some(true),
        ..Default::default()
    };
    collect_frames(state.import_api.start_stock_import(req).await.unwrap()).await;
    assert_eq!(material_name(&conn, "M-002"), "Материал 2");

    let req = StockImportRequest {
        warehouse_id: warehouse_id.clone(),
        file: Some(upload("stock.csv", &stock_csv_owned(&renamed_rows()))),
        update_names: Some(true),
        ..Default::default()
    };
    collect_frames(state.import_api.start_stock_import(req).await.unwrap()).await;
    assert_eq!(material_name(&conn, "M-002"), "Материал 2 (новое)");
}

#[tokio::test]
async fn test_headerless_file_with_explicit_mapping() {
    logging::init_test();
    let (_temp, state, conn) = test_state();
    let warehouse_id = create_warehouse(&conn, "Склад");

    let content = "K-1;Кабель ВВГ 3x2.5;м;1 250,50;100\n";
    let content = content.replace(';', "\t");
    let req = StockImportRequest {
        warehouse_id: warehouse_id.clone(),
        file: Some(upload("stock.tsv", &content)),
        no_headers: true,
        column_mapping: Some(
            r#"{"code":"Колонка 1","name":"Колонка 2","unit":"Колонка 3","price":"Колонка 4","quantity":"Колонка 5"}"#
                .to_string(),
        ),
        ..Default::default()
    };
    let frames = collect_frames(state.import_api.start_stock_import(req).await.unwrap()).await;
    assert_eq!(done_frame(&frames).current, 1);

    let material = StockRepository::from_connection(conn.clone())
        .find_material_by_code("K-1")
        .unwrap()
        .unwrap();
    assert_eq!(material.name, "Кабель ВВГ 3x2.5");
    assert_eq!(material.price, 1250.5);
}

#[tokio::test]
async fn test_conflict_check_unknown_warehouse() {
    logging::init_test();
    let (_temp, state, _conn) = test_state();

    let result = state.import_api.check_conflicts(ConflictCheckRequest {
        warehouse_id: "нет-такого".to_string(),
        file: Some(upload("stock.csv", &stock_csv(&[("A", "B", "1")]))),
        ..Default::default()
    });
    assert!(matches!(result, Err(zakaz_import::api::ApiError::NotFound(_))));
}
