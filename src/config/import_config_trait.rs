// ==========================================
// 工单系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入/回滚流程所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: HTTP 层在启动导入前读取批次参数
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 批次配置 =====

    /// 获取默认批次大小（请求未指定 batchSize 时使用）
    ///
    /// # 默认值
    /// - 50
    async fn get_default_batch_size(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;

    /// 获取批次大小上限（请求值超过时截断）
    ///
    /// # 默认值
    /// - 1000
    async fn get_max_batch_size(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;

    // ===== 进度流配置 =====

    /// 获取进度帧通道容量（帧）
    ///
    /// # 默认值
    /// - 16
    async fn get_stream_buffer(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;

    // ===== 回滚配置 =====

    /// 获取回滚删除的分块大小
    ///
    /// # 默认值
    /// - 500
    async fn get_reverse_chunk_size(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;

    /// 解析请求的批次大小
    ///
    /// # 逻辑
    /// 1. 缺失或为 0 时使用默认值
    /// 2. 超过上限时截断为上限
    async fn resolve_batch_size(
        &self,
        requested: Option<usize>,
    ) -> Result<usize, Box<dyn Error + Send + Sync>> {
        let max = self.get_max_batch_size().await?.max(1);
        let size = match requested {
            Some(size) if size > 0 => size,
            _ => self.get_default_batch_size().await?,
        };
        Ok(size.clamp(1, max))
    }
}
