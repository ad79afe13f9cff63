// ==========================================
// 工单系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 说明: *_tx 关联函数在批次保存点内执行，不自行加锁
// ==========================================

pub mod application_repo;
pub mod cohort_repo;
pub mod comment_repo;
pub mod error;
pub mod node_repo;
pub mod stock_repo;
pub mod user_repo;

// 重导出核心仓储
pub use application_repo::{ApplicationRepository, BodyCounts};
pub use cohort_repo::{tagged_tables, CohortRepository};
pub use comment_repo::{CommentRepository, FileRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use node_repo::NodeRepository;
pub use stock_repo::{NewMaterial, StockRepository};
pub use user_repo::{UserRepository, IMPORTED_USER_ROLE, PASSWORD_RESET_MARKER};
