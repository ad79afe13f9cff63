// ==========================================
// 工单系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类:
// - 启动期错误（文件/表头/映射/仓库）: 同步返回，不产生任何统计
// - 处理期错误（数据库/流中断）: 由进度流转为 error 帧
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("未提供文件: {0}")]
    FileNotProvided(String),

    #[error("文件格式不支持: {0}（仅支持 .tsv/.txt/.csv/.xlsx/.xls）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("文件无数据行: {0}")]
    EmptyInput(String),

    #[error("表头重复: {}", .0.join(", "))]
    DuplicateHeaders(Vec<String>),

    // ===== 列映射错误 =====
    #[error("必填字段未映射: {}", .0.join(", "))]
    MissingRequiredField(Vec<String>),

    #[error("列映射格式错误: {0}")]
    InvalidColumnMapping(String),

    #[error("参数错误 ({name}): {message}")]
    InvalidOption { name: String, message: String },

    // ===== 业务前置条件 =====
    #[error("仓库不存在: {0}")]
    WarehouseNotFound(String),

    // ===== 数据库错误 =====
    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ImportError {
    /// 是否为启动期错误（调用方输入问题）
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            ImportError::FileNotProvided(_)
                | ImportError::UnsupportedFormat(_)
                | ImportError::FileReadError(_)
                | ImportError::ExcelParseError(_)
                | ImportError::CsvParseError(_)
                | ImportError::EmptyInput(_)
                | ImportError::DuplicateHeaders(_)
                | ImportError::MissingRequiredField(_)
                | ImportError::InvalidColumnMapping(_)
                | ImportError::InvalidOption { .. }
                | ImportError::WarehouseNotFound(_)
        )
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Repository(RepositoryError::from(err))
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
