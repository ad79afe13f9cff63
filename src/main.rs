// ==========================================
// 工单系统 - 导入服务主入口
// ==========================================
// 技术栈: axum + Rust + SQLite
// 启动顺序: 日志 -> 启动配置 -> 语言 -> 建库 -> 路由 -> 监听
// ==========================================

use std::sync::Arc;

use anyhow::Context;
use zakaz_import::app::{build_router, AppState};
use zakaz_import::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    zakaz_import::logging::init();

    tracing::info!("==================================================");
    tracing::info!("工单系统 - 表格导入服务");
    tracing::info!("系统版本: {}", zakaz_import::VERSION);
    tracing::info!("==================================================");

    let config = ServerConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    zakaz_import::i18n::set_locale(&config.locale);

    let db_path = config.db_path.to_string_lossy().to_string();
    tracing::info!(db_path = %db_path, locale = %config.locale, "使用数据库");

    let state = AppState::new(db_path).map_err(|e| anyhow::anyhow!(e))?;

    let snapshot = state
        .config_manager
        .get_import_snapshot()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(?snapshot, "导入参数");

    let app = build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("无法监听 {}", config.bind))?;
    tracing::info!(addr = %config.bind, "导入服务已启动");

    axum::serve(listener, app).await.context("HTTP 服务异常退出")?;

    tracing::info!("导入服务已退出");
    Ok(())
}
