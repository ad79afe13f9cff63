// ==========================================
// 导入批次回滚集成测试
// ==========================================
// 覆盖: 统计、按分类回滚、all 依赖顺序、未标记记录不受影响、级联删除、
//       被手工库存引用的物料保留、目录/节点导入的回滚
// ==========================================

mod test_helpers;

use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};
use test_helpers::*;
use zakaz_import::api::{
    ApiError, LegacyImportRequest, MaterialImportRequest, NodeImportRequest, StockImportRequest,
};
use zakaz_import::app::AppState;
use zakaz_import::config::config_keys;
use zakaz_import::logging;

const COMMENTS_TSV: &str = "cid\tnid\tcomment\n\
1\t10\tПервый\n\
2\t10\tВторой\n\
3\t11\tТретий\n";

/// 导入工单/评论/用户/库存各一批
async fn import_everything(state: &AppState, conn: &Arc<Mutex<Connection>>) -> String {
    let req = LegacyImportRequest {
        orders: Some(upload(
            "orders.tsv",
            &orders_tsv(&[(10, "", "Клиент А"), (11, "5. Проектирование", "Клиент Б")]),
        )),
        comments: Some(upload("comments.tsv", COMMENTS_TSV)),
        users: Some(upload(
            "users.tsv",
            &users_tsv(&[(20, "Оператор", "op@example.com"), (21, "Мастер", "master@example.com")]),
        )),
        ..Default::default()
    };
    collect_frames(state.import_api.start_legacy_import(req).await.unwrap()).await;

    let warehouse_id = create_warehouse(conn, "Склад");
    let req = StockImportRequest {
        warehouse_id: warehouse_id.clone(),
        file: Some(upload("stock.csv", &stock_csv_owned(&numbered_stock_rows(5)))),
        ..Default::default()
    };
    collect_frames(state.import_api.start_stock_import(req).await.unwrap()).await;
    warehouse_id
}

/// 手工录入（无来源标记）的记录
fn insert_manual_records(conn: &Arc<Mutex<Connection>>, warehouse_id: &str) {
    let conn = conn.lock().unwrap();
    conn.execute(
        r#"
        INSERT INTO applications (
            id, application_number, customer_type, customer_fullname, service_type,
            status, urgency, created_at, updated_at
        ) VALUES ('manual-app', 9001, 'individual', 'Ручной клиент', 'apartment',
                  'new', 'normal', '2024-01-01', '2024-01-01')
        "#,
        [],
    )
    .unwrap();
    conn.execute(
        r#"
        INSERT INTO users (id, email, full_name, role, password_hash, created_at, updated_at)
        VALUES ('manual-user', 'manager@example.com', 'Руководитель', 'admin', 'hash',
                '2024-01-01', '2024-01-01')
        "#,
        [],
    )
    .unwrap();
    conn.execute(
        r#"
        INSERT INTO materials (id, code, name, created_at, updated_at)
        VALUES ('manual-mat', 'HAND-1', 'Ручной материал', '2024-01-01', '2024-01-01')
        "#,
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO warehouse_stocks (warehouse_id, material_id, quantity) VALUES (?1, 'manual-mat', 3)",
        params![warehouse_id],
    )
    .unwrap();
}

#[tokio::test]
async fn test_counts_reflect_tagged_records() {
    logging::init_test();
    let (_temp, state, conn) = test_state();
    let warehouse_id = import_everything(&state, &conn).await;
    insert_manual_records(&conn, &warehouse_id);

    let counts = state.cohort_api.counts().await.unwrap().counts;
    assert_eq!(counts["orders"], 2);
    assert_eq!(counts["comments"], 3);
    assert_eq!(counts["files"], 0);
    assert_eq!(counts["users"], 2);
    // 库存行 + 物料
    assert_eq!(counts["stock"], 10);
}

#[tokio::test]
async fn test_reverse_all_leaves_untagged_records() {
    logging::init_test();
    let (_temp, state, conn) = test_state();
    let warehouse_id = import_everything(&state, &conn).await;
    insert_manual_records(&conn, &warehouse_id);

    // 小块删除，验证分块循环
    state
        .config_manager
        .set_global_config_value(config_keys::REVERSE_CHUNK_SIZE, "2")
        .unwrap();

    let report = state.cohort_api.reverse("all").await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.deleted["comments"], 3);
    assert_eq!(report.deleted["orders"], 2);
    assert_eq!(report.deleted["users"], 2);
    assert_eq!(report.deleted["stock"], 10);

    let counts = state.cohort_api.counts().await.unwrap().counts;
    assert!(counts.values().all(|&c| c == 0), "回滚后不应残留标记记录: {:?}", counts);

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM applications"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM users"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM materials"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM warehouse_stocks"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM warehouses"), 1);

    // 再次回滚: 全部为 0
    let again = state.cohort_api.reverse("all").await.unwrap();
    assert!(again.deleted.values().all(|&c| c == 0));
}

#[tokio::test]
async fn test_reverse_single_category() {
    logging::init_test();
    let (_temp, state, conn) = test_state();
    import_everything(&state, &conn).await;

    let report = state.cohort_api.reverse("comments").await.unwrap();
    assert_eq!(report.deleted.len(), 1);
    assert_eq!(report.deleted["comments"], 3);

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM application_comments"), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM applications"), 2);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM users"), 2);
}

#[tokio::test]
async fn test_reverse_orders_cascades_to_untagged_dependents() {
    logging::init_test();
    let (_temp, state, conn) = test_state();
    import_everything(&state, &conn).await;

    // 手工评论挂在导入的工单上
    {
        let guard = conn.lock().unwrap();
        let app_id: String = guard
            .query_row("SELECT id FROM applications WHERE legacy_id = 10", [], |row| row.get(0))
            .unwrap();
        guard
            .execute(
                r#"
                INSERT INTO application_comments (id, application_id, user_name, comment, created_at)
                VALUES ('manual-comment', ?1, 'Оператор', 'Перезвонить', '2024-01-01')
                "#,
                params![app_id],
            )
            .unwrap();
    }

    // applications 为旧名称
    let report = state.cohort_api.reverse("applications").await.unwrap();
    assert_eq!(report.deleted["orders"], 2);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM application_comments"), 0);
}

#[tokio::test]
async fn test_reverse_stock_keeps_material_with_manual_stock_elsewhere() {
    logging::init_test();
    let (_temp, state, conn) = test_state();
    import_everything(&state, &conn).await;

    // 另一个仓库手工录入了导入物料 M-001 的库存
    let other_warehouse = create_warehouse(&conn, "Склад Б");
    {
        let guard = conn.lock().unwrap();
        guard
            .execute(
                r#"
                INSERT INTO warehouse_stocks (warehouse_id, material_id, quantity)
                SELECT ?1, id, 7 FROM materials WHERE code = 'M-001'
                "#,
                params![other_warehouse],
            )
            .unwrap();
    }

    // 5 行导入库存 + 4 个未被手工库存引用的物料
    let counts = state.cohort_api.counts().await.unwrap().counts;
    assert_eq!(counts["stock"], 9);

    let report = state.cohort_api.reverse("stock").await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.deleted["stock"], 9);

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM materials WHERE code = 'M-001'"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM materials"), 1);
    let manual_quantity = count(
        &conn,
        &format!(
            "SELECT CAST(quantity AS INTEGER) FROM warehouse_stocks WHERE warehouse_id = '{}'",
            other_warehouse
        ),
    );
    assert_eq!(manual_quantity, 7);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM warehouse_stocks"), 1);

    // 剩下的物料仍被手工库存引用，再次回滚不删除
    let again = state.cohort_api.reverse("stock").await.unwrap();
    assert_eq!(again.deleted["stock"], 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM warehouse_stocks"), 1);
}

#[tokio::test]
async fn test_catalog_and_node_imports_reversible() {
    logging::init_test();
    let (_temp, state, conn) = test_state();

    let req = MaterialImportRequest {
        file: Some(upload(
            "catalog.csv",
            "Код,Наименование,Ед.изм.,Цена,Остаток
             C-1,Кабель ВВГ,м,80,500
             ,Стяжка 100мм,уп,45,12
             C-1,Кабель ВВГнг,м,85,450
",
        )),
        ..Default::default()
    };
    let frames = collect_frames(state.import_api.start_material_import(req).await.unwrap()).await;
    let stats = done_frame(&frames).stats.clone().unwrap();
    assert_eq!(stats["materials"].imported, 2);
    assert_eq!(stats["materials"].skipped, 1);

    let req = NodeImportRequest {
        file: Some(upload(
            "nodes.csv",
            "ID,Код,Адрес,Статус
1,УЗ-1,ул. Садовая 1,Построен
2,УЗ-2,ул. Садовая 2,Проектируется
",
        )),
        ..Default::default()
    };
    collect_frames(state.import_api.start_node_import(req).await.unwrap()).await;
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM network_nodes WHERE status = 'planned'"),
        1
    );

    let counts = state.cohort_api.counts().await.unwrap().counts;
    assert_eq!(counts["materials"], 2);
    assert_eq!(counts["nodes"], 2);

    let report = state.cohort_api.reverse("nodes").await.unwrap();
    assert_eq!(report.deleted.len(), 1);
    assert_eq!(report.deleted["nodes"], 2);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM materials"), 2);

    let report = state.cohort_api.reverse("all").await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.deleted["materials"], 2);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM materials"), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM network_nodes"), 0);
}

#[tokio::test]
async fn test_reverse_unknown_category() {
    logging::init_test();
    let (_temp, state, _conn) = test_state();

    let err = state.cohort_api.reverse("everything").await.err().unwrap();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}
