// ==========================================
// 进度推送集成测试
// ==========================================
// 覆盖: 批次帧序列、终止帧、批次大小无关性、行数上限
// ==========================================

mod test_helpers;

use test_helpers::*;
use zakaz_import::api::{LegacyImportRequest, StockImportRequest};
use zakaz_import::domain::types::{LogLevel, Phase, SourceType};
use zakaz_import::logging;

#[tokio::test]
async fn test_stock_import_batch_frames() {
    logging::init_test();
    let (_temp, state, conn) = test_state();
    let warehouse_id = create_warehouse(&conn, "Основной склад");

    let rows = numbered_stock_rows(5);
    let req = StockImportRequest {
        warehouse_id: warehouse_id.clone(),
        file: Some(upload("stock.csv", &stock_csv_owned(&rows))),
        batch_size: Some(2),
        ..Default::default()
    };

    let stream = state.import_api.start_stock_import(req).await.expect("启动导入失败");
    assert_eq!(stream.total, 5);
    let frames = collect_frames(stream).await;

    // 批次边界: 2, 4, 5（最后一批即终止帧）
    assert_eq!(batch_currents(&frames), vec![2, 4, 5]);
    assert_monotonic(&frames);

    let done = done_frame(&frames);
    assert_eq!(done.phase, Phase::Done);
    assert_eq!(done.current, 5);
    assert_eq!(done.total, 5);

    let stats = done.stats.as_ref().unwrap();
    let stock = stats["stock"];
    assert_eq!(stock.imported, 5);
    assert_eq!(stock.total, 5);
    assert!(stock.is_balanced());

    // 首帧为 init 阶段
    assert_eq!(frames[0].phase, Phase::Init);
    assert!(frames
        .iter()
        .any(|f| f.phase == Phase::Processing(SourceType::WarehouseStock)));

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM materials"), 5);
    assert_eq!(
        count(
            &conn,
            "SELECT COUNT(*) FROM warehouse_stocks WHERE import_source = 'warehouse-stock'"
        ),
        5
    );
}

#[tokio::test]
async fn test_single_batch_emits_only_done_stats_frame() {
    logging::init_test();
    let (_temp, state, conn) = test_state();
    let warehouse_id = create_warehouse(&conn, "Склад");

    let req = StockImportRequest {
        warehouse_id,
        file: Some(upload("stock.csv", &stock_csv_owned(&numbered_stock_rows(3)))),
        batch_size: Some(100),
        ..Default::default()
    };
    let frames = collect_frames(state.import_api.start_stock_import(req).await.unwrap()).await;

    assert_eq!(batch_currents(&frames), vec![3]);
    assert!(done_frame(&frames).is_done());
}

#[tokio::test]
async fn test_row_errors_do_not_abort_job() {
    logging::init_test();
    let (_temp, state, conn) = test_state();
    let warehouse_id = create_warehouse(&conn, "Склад");

    let content = stock_csv(&[
        ("A-1", "Кабель UTP", "10"),
        ("", "Без кода", "1"),
        ("A-3", "Розетка", "много"),
        ("A-4", "Коннектор", "5"),
    ]);
    let req = StockImportRequest {
        warehouse_id,
        file: Some(upload("stock.csv", &content)),
        batch_size: Some(2),
        ..Default::default()
    };
    let frames = collect_frames(state.import_api.start_stock_import(req).await.unwrap()).await;

    let done = done_frame(&frames);
    let stock = done.stats.as_ref().unwrap()["stock"];
    assert_eq!(stock.imported, 2);
    assert_eq!(stock.total, 4);
    assert!(stock.is_balanced());
    assert_eq!(stock.skipped + stock.errors, 2);

    // 每个问题行都有一条行级日志
    let row_logs = frames
        .iter()
        .filter(|f| f.stats.is_none() && f.phase == Phase::Processing(SourceType::WarehouseStock))
        .filter(|f| {
            matches!(
                f.log.as_ref().map(|l| l.level),
                Some(LogLevel::Warning) | Some(LogLevel::Error)
            )
        })
        .count();
    assert_eq!(row_logs, 2);

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM materials"), 2);
}

/// 执行一次旧系统导入，返回终止帧统计与库中记录数
async fn legacy_run(batch_size: usize) -> (String, i64, i64) {
    let (_temp, state, conn) = test_state();

    let orders: Vec<(i64, String, String)> = (1..=12)
        .map(|nid| {
            let stage = match nid % 4 {
                0 => "9. Выполнена",
                1 => "1.2. Аварийная заявка",
                2 => "",
                _ => "13. Неизвестный этап",
            };
            (nid, stage.to_string(), format!("Клиент {}", nid))
        })
        .collect();
    let orders: Vec<(i64, &str, &str)> = orders
        .iter()
        .map(|(nid, stage, fio)| (*nid, stage.as_str(), fio.as_str()))
        .collect();

    let users = users_tsv(&[
        (0, "Аноним", ""),
        (1, "Администратор", "admin@example.com"),
        (2, "Инженер", "ENG@example.com"),
        (3, "Дубль почты", "admin@example.com"),
        (4, "", "noname@example.com"),
    ]);

    let req = LegacyImportRequest {
        orders: Some(upload("orders.tsv", &orders_tsv(&orders))),
        users: Some(upload("users.tsv", &users)),
        batch_size: Some(batch_size),
        ..Default::default()
    };
    let frames = collect_frames(state.import_api.start_legacy_import(req).await.unwrap()).await;
    assert_monotonic(&frames);

    let done = done_frame(&frames);
    let stats = serde_json::to_string(done.stats.as_ref().unwrap()).unwrap();
    (
        stats,
        count(&conn, "SELECT COUNT(*) FROM applications"),
        count(&conn, "SELECT COUNT(*) FROM users"),
    )
}

#[tokio::test]
async fn test_batch_size_does_not_change_outcome() {
    logging::init_test();

    let small = legacy_run(10).await;
    let large = legacy_run(100).await;
    let tiny = legacy_run(1).await;

    assert_eq!(small, large);
    assert_eq!(small, tiny);

    // 未知阶段的 3 条工单计为错误，不写库
    assert_eq!(small.1, 9);
    // 匿名、重复邮箱、无姓名的用户不写库
    assert_eq!(small.2, 2);
}

#[tokio::test]
async fn test_legacy_categories_in_fixed_order() {
    logging::init_test();
    let (_temp, state, _conn) = test_state();

    let req = LegacyImportRequest {
        users: Some(upload("users.tsv", &users_tsv(&[(5, "Оператор", "op@example.com")]))),
        orders: Some(upload(
            "orders.tsv",
            &orders_tsv(&[(1, "", "Петров"), (2, "", "Сидоров")]),
        )),
        ..Default::default()
    };
    let frames = collect_frames(state.import_api.start_legacy_import(req).await.unwrap()).await;

    let first_orders = frames
        .iter()
        .position(|f| f.phase == Phase::Processing(SourceType::Orders))
        .unwrap();
    let first_users = frames
        .iter()
        .position(|f| f.phase == Phase::Processing(SourceType::Users))
        .unwrap();
    assert!(first_orders < first_users);

    let done = done_frame(&frames);
    assert_eq!(done.current, 3);
    let stats = done.stats.as_ref().unwrap();
    assert_eq!(stats["orders"].imported, 2);
    assert_eq!(stats["users"].imported, 1);
}

#[tokio::test]
async fn test_record_limit_applies_per_file() {
    logging::init_test();
    let (_temp, state, conn) = test_state();
    let warehouse_id = create_warehouse(&conn, "Склад");

    let req = StockImportRequest {
        warehouse_id,
        file: Some(upload("stock.csv", &stock_csv_owned(&numbered_stock_rows(10)))),
        batch_size: Some(3),
        record_limit: Some(4),
        ..Default::default()
    };
    let stream = state.import_api.start_stock_import(req).await.unwrap();
    assert_eq!(stream.total, 4);

    let frames = collect_frames(stream).await;
    assert_eq!(batch_currents(&frames), vec![3, 4]);
    assert_eq!(done_frame(&frames).current, 4);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM materials"), 4);

    // init 阶段提示行数上限
    assert!(frames
        .iter()
        .filter(|f| f.phase == Phase::Init)
        .any(|f| f.log.as_ref().map(|l| l.level) == Some(LogLevel::Warning)));
}
