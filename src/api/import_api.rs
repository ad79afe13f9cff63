// ==========================================
// 工单系统 - 导入API
// ==========================================
// 职责: 校验导入请求、组装各分类处理器、启动进度流
// 红线: 启动期错误（文件/表头/映射/仓库）在任何推送之前同步返回
// 顺序: 旧系统导入按 orders -> comments -> files -> users 处理
// 说明: 目录/节点导入在启动前扫描文件确定重复键
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ImportConfigReader;
use crate::domain::import_job::ProgressFrame;
use crate::domain::records::ConflictReport;
use crate::domain::types::ConflictPolicy;
use crate::importer::column_mapper::{
    BodyColumnMapping, ColumnMapping, CommentColumnMapping, FileColumnMapping,
    MaterialCatalogColumnMapping, NodeColumnMapping, OrderColumnMapping, StockColumnMapping,
    UserColumnMapping,
};
use crate::importer::conflict_detector::ConflictDetector;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::TabularFile;
use crate::importer::processors::{
    BodyProcessor, CommentProcessor, FileProcessor, MaterialCatalogProcessor, NodeProcessor,
    OrderProcessor, StockProcessor, UserProcessor,
};
use crate::importer::progress::{plan_job, ImportSource, ProgressStreamer};
use crate::importer::row_processor::RowProcessor;
use crate::importer::stage_mapper::StageTable;
use crate::repository::{ApplicationRepository, BodyCounts, StockRepository};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{info, instrument};

/// 预览返回的行数
pub const PREVIEW_ROWS: usize = 15;

/// 上传的文件
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    fn into_tabular(self, no_headers: bool) -> ImportResult<TabularFile> {
        let file = TabularFile::new(self.name, self.bytes)?;
        Ok(if no_headers { file.without_headers() } else { file })
    }
}

// ==========================================
// 请求结构
// ==========================================

/// 旧系统批量导入请求
#[derive(Debug, Clone, Default)]
pub struct LegacyImportRequest {
    pub orders: Option<UploadedFile>,
    pub comments: Option<UploadedFile>,
    pub files: Option<UploadedFile>,
    pub users: Option<UploadedFile>,
    pub batch_size: Option<usize>,
    /// 0 或缺失表示不限
    pub record_limit: Option<usize>,
}

/// 工单正文导入请求
#[derive(Debug, Clone, Default)]
pub struct BodyImportRequest {
    pub body: Option<UploadedFile>,
    pub column_mapping: Option<String>,
    pub batch_size: Option<usize>,
    pub record_limit: Option<usize>,
}

/// 仓库库存导入请求
#[derive(Debug, Clone, Default)]
pub struct StockImportRequest {
    pub warehouse_id: String,
    pub file: Option<UploadedFile>,
    pub column_mapping: Option<String>,
    pub conflict_resolution: Option<ConflictPolicy>,
    /// 旧接口 options.updateNames
    pub update_names: Option<bool>,
    pub no_headers: bool,
    pub batch_size: Option<usize>,
    pub record_limit: Option<usize>,
}

/// 物料目录导入请求
#[derive(Debug, Clone, Default)]
pub struct MaterialImportRequest {
    pub file: Option<UploadedFile>,
    pub column_mapping: Option<String>,
    pub no_headers: bool,
    pub batch_size: Option<usize>,
    pub record_limit: Option<usize>,
}

/// 网络节点导入请求
#[derive(Debug, Clone, Default)]
pub struct NodeImportRequest {
    pub file: Option<UploadedFile>,
    pub column_mapping: Option<String>,
    pub batch_size: Option<usize>,
    pub record_limit: Option<usize>,
}

/// 名称冲突检测请求
#[derive(Debug, Clone, Default)]
pub struct ConflictCheckRequest {
    pub warehouse_id: String,
    pub file: Option<UploadedFile>,
    pub column_mapping: Option<String>,
    pub no_headers: bool,
}

// ==========================================
// 响应结构
// ==========================================

/// 已启动的导入流
pub struct ImportStream {
    pub job_id: String,
    pub total: u64,
    pub frames: mpsc::Receiver<ProgressFrame>,
}

/// 文件预览
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub headers: Vec<String>,
    pub mapping: HashMap<&'static str, Option<String>>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

/// 导入API
pub struct ImportApi {
    conn: Arc<Mutex<Connection>>,
    stages: Arc<StageTable>,
    config: Arc<dyn ImportConfigReader>,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        stages: Arc<StageTable>,
        config: Arc<dyn ImportConfigReader>,
    ) -> Self {
        Self {
            conn,
            stages,
            config,
        }
    }

    /// 旧系统批量导入（工单/评论/附件/用户）
    ///
    /// # 返回
    /// - Ok(ImportStream): 进度帧接收端
    /// - Err(ApiError): 启动期错误（400）
    #[instrument(skip(self, req), fields(
        orders = req.orders.is_some(),
        comments = req.comments.is_some(),
        files = req.files.is_some(),
        users = req.users.is_some(),
    ))]
    pub async fn start_legacy_import(&self, req: LegacyImportRequest) -> ApiResult<ImportStream> {
        if req.orders.is_none() && req.users.is_none() {
            return Err(ApiError::InvalidInput(
                "需要至少提供 orders 或 users 文件".to_string(),
            ));
        }

        let record_limit = normalize_limit(req.record_limit);
        let mut processors: Vec<(Box<dyn RowProcessor>, TabularFile)> = Vec::new();

        if let Some(upload) = req.orders {
            let file = upload.into_tabular(false)?;
            let mapping = legacy_mapping::<OrderColumnMapping>(&file)?;
            processors.push((
                Box::new(OrderProcessor::new(mapping, self.stages.clone())),
                file,
            ));
        }
        if let Some(upload) = req.comments {
            let file = upload.into_tabular(false)?;
            let mapping = legacy_mapping::<CommentColumnMapping>(&file)?;
            processors.push((Box::new(CommentProcessor::new(mapping)), file));
        }
        if let Some(upload) = req.files {
            let file = upload.into_tabular(false)?;
            let mapping = legacy_mapping::<FileColumnMapping>(&file)?;
            processors.push((Box::new(FileProcessor::new(mapping)), file));
        }
        if let Some(upload) = req.users {
            let file = upload.into_tabular(false)?;
            let mapping = legacy_mapping::<UserColumnMapping>(&file)?;
            processors.push((Box::new(UserProcessor::new(mapping)), file));
        }

        self.start(processors, req.batch_size, record_limit).await
    }

    /// 工单正文导入（只更新已导入的工单）
    #[instrument(skip(self, req), fields(has_mapping = req.column_mapping.is_some()))]
    pub async fn start_body_import(&self, req: BodyImportRequest) -> ApiResult<ImportStream> {
        let upload = req
            .body
            .ok_or_else(|| ImportError::FileNotProvided("body".to_string()))?;
        let file = upload.into_tabular(false)?;

        let headers = file.headers()?;
        let mapping = match non_blank(req.column_mapping.as_deref()) {
            Some(raw) => BodyColumnMapping::from_json_over(BodyColumnMapping::legacy_default(), raw)?,
            None => BodyColumnMapping::legacy_default(),
        };
        mapping.validate(&headers)?;

        let processors: Vec<(Box<dyn RowProcessor>, TabularFile)> =
            vec![(Box::new(BodyProcessor::new(mapping)), file)];
        self.start(processors, req.batch_size, normalize_limit(req.record_limit))
            .await
    }

    /// 正文导入统计
    pub fn body_counts(&self) -> ApiResult<BodyCounts> {
        let repo = ApplicationRepository::from_connection(self.conn.clone());
        Ok(repo.count_bodies()?)
    }

    /// 仓库库存导入
    #[instrument(skip(self, req), fields(warehouse_id = %req.warehouse_id))]
    pub async fn start_stock_import(&self, req: StockImportRequest) -> ApiResult<ImportStream> {
        self.ensure_warehouse(&req.warehouse_id)?;

        let upload = req
            .file
            .ok_or_else(|| ImportError::FileNotProvided("file".to_string()))?;
        let file = upload.into_tabular(req.no_headers)?;
        let mapping = stock_mapping(&file, req.column_mapping.as_deref())?;
        let policy = ConflictPolicy::resolve(req.conflict_resolution, req.update_names);
        info!(policy = ?policy, "库存导入名称冲突策略");

        let processors: Vec<(Box<dyn RowProcessor>, TabularFile)> = vec![(
            Box::new(StockProcessor::new(req.warehouse_id, mapping, policy)),
            file,
        )];
        self.start(processors, req.batch_size, normalize_limit(req.record_limit))
            .await
    }

    /// 物料目录导入（按 code 或名称新增/覆盖）
    #[instrument(skip(self, req), fields(has_mapping = req.column_mapping.is_some()))]
    pub async fn start_material_import(&self, req: MaterialImportRequest) -> ApiResult<ImportStream> {
        let upload = req
            .file
            .ok_or_else(|| ImportError::FileNotProvided("file".to_string()))?;
        let file = upload.into_tabular(req.no_headers)?;
        let mapping = detected_mapping::<MaterialCatalogColumnMapping>(
            &file,
            req.column_mapping.as_deref(),
            MaterialCatalogColumnMapping::default(),
        )?;

        let record_limit = normalize_limit(req.record_limit);
        let processor = MaterialCatalogProcessor::new(mapping, &file, record_limit)?;
        let processors: Vec<(Box<dyn RowProcessor>, TabularFile)> = vec![(Box::new(processor), file)];
        self.start(processors, req.batch_size, record_limit).await
    }

    /// 网络节点导入（按 code 新增/覆盖）
    #[instrument(skip(self, req), fields(has_mapping = req.column_mapping.is_some()))]
    pub async fn start_node_import(&self, req: NodeImportRequest) -> ApiResult<ImportStream> {
        let upload = req
            .file
            .ok_or_else(|| ImportError::FileNotProvided("file".to_string()))?;
        let file = upload.into_tabular(false)?;
        let mapping = detected_mapping::<NodeColumnMapping>(
            &file,
            req.column_mapping.as_deref(),
            NodeColumnMapping::legacy_default(),
        )?;

        let record_limit = normalize_limit(req.record_limit);
        let processor = NodeProcessor::new(mapping, &file, record_limit)?;
        let processors: Vec<(Box<dyn RowProcessor>, TabularFile)> = vec![(Box::new(processor), file)];
        self.start(processors, req.batch_size, record_limit).await
    }

    /// 名称冲突检测（只读）
    #[instrument(skip(self, req), fields(warehouse_id = %req.warehouse_id))]
    pub fn check_conflicts(&self, req: ConflictCheckRequest) -> ApiResult<ConflictReport> {
        self.ensure_warehouse(&req.warehouse_id)?;

        let upload = req
            .file
            .ok_or_else(|| ImportError::FileNotProvided("file".to_string()))?;
        let file = upload.into_tabular(req.no_headers)?;
        let mapping = stock_mapping(&file, req.column_mapping.as_deref())?;

        let repo = StockRepository::from_connection(self.conn.clone());
        let report = ConflictDetector::new(&repo).detect(&file, &mapping)?;
        info!(
            total = report.total,
            conflicts = report.conflicts.len(),
            new_materials = report.new_materials,
            "名称冲突检测完成"
        );
        Ok(report)
    }

    /// 文件预览: 表头、自动识别的库存映射、前若干行、总行数
    pub fn preview(&self, upload: UploadedFile, no_headers: bool) -> ApiResult<PreviewResponse> {
        let file = upload.into_tabular(no_headers)?;
        let headers = file.headers()?;
        let mapping = StockColumnMapping::auto_detect(&headers);

        let rows = file
            .preview(PREVIEW_ROWS)?
            .into_iter()
            .map(|record| headers.iter().map(|h| record.get(h).to_string()).collect())
            .collect();

        Ok(PreviewResponse {
            mapping: mapping.to_map(),
            total_rows: file.count_records()?,
            headers,
            rows,
        })
    }

    fn ensure_warehouse(&self, warehouse_id: &str) -> ApiResult<()> {
        let repo = StockRepository::from_connection(self.conn.clone());
        if repo.warehouse_exists(warehouse_id)? {
            Ok(())
        } else {
            Err(ImportError::WarehouseNotFound(warehouse_id.to_string()).into())
        }
    }

    /// 统计行数、创建任务并在阻塞线程中启动进度流
    async fn start(
        &self,
        processors: Vec<(Box<dyn RowProcessor>, TabularFile)>,
        batch_size: Option<usize>,
        record_limit: Option<usize>,
    ) -> ApiResult<ImportStream> {
        let batch_size = self
            .config
            .resolve_batch_size(batch_size)
            .await
            .map_err(|e| ApiError::InternalError(format!("读取批次配置失败: {}", e)))?;
        let buffer = self
            .config
            .get_stream_buffer()
            .await
            .map_err(|e| ApiError::InternalError(format!("读取进度流配置失败: {}", e)))?;

        let sources = processors
            .into_iter()
            .map(|(processor, file)| ImportSource::new(processor, file, record_limit))
            .collect::<ImportResult<Vec<_>>>()?;
        let job = plan_job(&sources, batch_size, record_limit)?;

        let job_id = job.job_id.clone();
        let total = job.total();
        info!(job_id = %job_id, total, batch_size, "导入任务已创建");

        let frames = ProgressStreamer::new(self.conn.clone(), batch_size).spawn(job, sources, buffer);
        Ok(ImportStream {
            job_id,
            total,
            frames,
        })
    }
}

/// 旧系统固定列名映射，并校验必填列
fn legacy_mapping<M: ColumnMapping>(file: &TabularFile) -> ImportResult<M> {
    let headers = file.headers()?;
    let mapping = M::legacy_default();
    mapping.validate(&headers)?;
    Ok(mapping)
}

/// 库存映射: 请求未携带时自动识别
fn stock_mapping(file: &TabularFile, raw: Option<&str>) -> ImportResult<StockColumnMapping> {
    detected_mapping(file, raw, StockColumnMapping::default())
}

/// 请求携带映射时覆盖到 base 上，否则按表头自动识别；随后校验必填列
fn detected_mapping<M: ColumnMapping>(file: &TabularFile, raw: Option<&str>, base: M) -> ImportResult<M> {
    let headers = file.headers()?;
    let mapping = match non_blank(raw) {
        Some(raw) => M::from_json_over(base, raw)?,
        None => M::auto_detect(&headers),
    };
    mapping.validate(&headers)?;
    Ok(mapping)
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.filter(|r| !r.trim().is_empty())
}

fn normalize_limit(limit: Option<usize>) -> Option<usize> {
    limit.filter(|&l| l > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigManager;
    use crate::db::{init_schema, open_sqlite_connection};

    fn api() -> (ImportApi, Arc<Mutex<Connection>>) {
        let conn = open_sqlite_connection(":memory:").unwrap();
        init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());
        (
            ImportApi::new(conn.clone(), Arc::new(StageTable::legacy()), config),
            conn,
        )
    }

    fn csv(content: &str) -> UploadedFile {
        UploadedFile::new("stock.csv", content.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_legacy_import_requires_orders_or_users() {
        let (api, _) = api();
        let req = LegacyImportRequest {
            comments: Some(UploadedFile::new("comments.tsv", b"cid\tnid\n".to_vec())),
            ..Default::default()
        };
        let err = api.start_legacy_import(req).await.err().unwrap();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_stock_import_unknown_warehouse() {
        let (api, _) = api();
        let req = StockImportRequest {
            warehouse_id: "missing".to_string(),
            file: Some(csv("code,name,qty\nA,Кабель,1\n")),
            ..Default::default()
        };
        let err = api.start_stock_import(req).await.err().unwrap();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stock_import_missing_required_mapping() {
        let (api, conn) = api();
        let warehouse_id = StockRepository::from_connection(conn).create_warehouse("Основной").unwrap();
        let req = StockImportRequest {
            warehouse_id,
            file: Some(csv("code,name,qty\nA,Кабель,1\n")),
            column_mapping: Some(r#"{"code":"code","name":"name"}"#.to_string()),
            ..Default::default()
        };
        let err = api.start_stock_import(req).await.err().unwrap();
        assert!(err.to_string().contains("quantity"));
    }

    #[tokio::test]
    async fn test_material_import_requires_name_column() {
        let (api, _) = api();
        let req = MaterialImportRequest {
            file: Some(csv("Код,Цена\nA,10\n")),
            ..Default::default()
        };
        let err = api.start_material_import(req).await.err().unwrap();
        assert!(err.to_string().contains("name"));
    }

    #[tokio::test]
    async fn test_node_import_counts_rows_before_stream() {
        let (api, _) = api();
        let req = NodeImportRequest {
            file: Some(UploadedFile::new(
                "nodes.csv",
                "Код,Адрес\nУЗ-1,ул. Мира 1\nУЗ-2,ул. Мира 2\n".as_bytes().to_vec(),
            )),
            record_limit: Some(1),
            ..Default::default()
        };
        let stream = api.start_node_import(req).await.unwrap();
        assert_eq!(stream.total, 1);
    }

    #[test]
    fn test_preview_auto_detects_mapping() {
        let (api, _) = api();
        let preview = api
            .preview(csv("Код,Наименование,Ед.изм,Остаток\nA,Кабель,м,10\nB,Розетка,шт,2\n"), false)
            .unwrap();
        assert_eq!(preview.total_rows, 2);
        assert_eq!(preview.rows[0], vec!["A", "Кабель", "м", "10"]);
        assert_eq!(preview.mapping["code"].as_deref(), Some("Код"));
        assert_eq!(preview.mapping["quantity"].as_deref(), Some("Остаток"));
        assert_eq!(preview.mapping["price"], None);
    }
}
