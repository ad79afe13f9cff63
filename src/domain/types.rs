// ==========================================
// 工单系统 - 领域类型定义
// ==========================================
// 职责: 导入来源、阶段、日志级别、工单状态、冲突策略等枚举
// 序列化格式: 与 HTTP 帧/数据库取值一致（小写 / snake_case）
// ==========================================

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 导入来源类型 (Source Type)
// ==========================================
// 同时作为来源标记 import_source 写入数据库
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    Orders,
    Comments,
    Files,
    Users,
    Body,
    WarehouseStock,
    Materials,
    Nodes,
}

impl SourceType {
    pub const ALL: [SourceType; 8] = [
        SourceType::Orders,
        SourceType::Comments,
        SourceType::Files,
        SourceType::Users,
        SourceType::Body,
        SourceType::WarehouseStock,
        SourceType::Materials,
        SourceType::Nodes,
    ];

    /// 来源标记（写入 import_source 列）
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Orders => "orders",
            SourceType::Comments => "comments",
            SourceType::Files => "files",
            SourceType::Users => "users",
            SourceType::Body => "body",
            SourceType::WarehouseStock => "warehouse-stock",
            SourceType::Materials => "materials",
            SourceType::Nodes => "nodes",
        }
    }

    /// 统计分类键（EntityStats 的 key）
    pub fn stats_key(&self) -> &'static str {
        match self {
            SourceType::WarehouseStock => "stock",
            other => other.as_str(),
        }
    }

    /// 用户可见名称的 i18n key
    pub fn label_key(&self) -> &'static str {
        match self {
            SourceType::Orders => "category.orders",
            SourceType::Comments => "category.comments",
            SourceType::Files => "category.files",
            SourceType::Users => "category.users",
            SourceType::Body => "category.body",
            SourceType::WarehouseStock => "category.stock",
            SourceType::Materials => "category.materials",
            SourceType::Nodes => "category.nodes",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 导入阶段 (Phase)
// ==========================================
// 序列化为: init / parsing / processing-<entity> / done / error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Parsing,
    Processing(SourceType),
    Done,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Init => write!(f, "init"),
            Phase::Parsing => write!(f, "parsing"),
            Phase::Processing(source) => write!(f, "processing-{}", source.stats_key()),
            Phase::Done => write!(f, "done"),
            Phase::Error => write!(f, "error"),
        }
    }
}

impl Serialize for Phase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Phase {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Phase::Init),
            "parsing" => Ok(Phase::Parsing),
            "done" => Ok(Phase::Done),
            "error" => Ok(Phase::Error),
            "processing-orders" => Ok(Phase::Processing(SourceType::Orders)),
            "processing-comments" => Ok(Phase::Processing(SourceType::Comments)),
            "processing-files" => Ok(Phase::Processing(SourceType::Files)),
            "processing-users" => Ok(Phase::Processing(SourceType::Users)),
            "processing-body" => Ok(Phase::Processing(SourceType::Body)),
            "processing-stock" => Ok(Phase::Processing(SourceType::WarehouseStock)),
            "processing-materials" => Ok(Phase::Processing(SourceType::Materials)),
            "processing-nodes" => Ok(Phase::Processing(SourceType::Nodes)),
            other => Err(format!("未知阶段: {}", other)),
        }
    }
}

// ==========================================
// 日志级别 (Log Level)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

// ==========================================
// 工单状态 (Order Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    NoTech,
    Thinking,
    Estimation,
    EstimationDone,
    Contract,
    Design,
    Approval,
    QueueInstall,
    Install,
    Installed,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::NoTech => "no_tech",
            OrderStatus::Thinking => "thinking",
            OrderStatus::Estimation => "estimation",
            OrderStatus::EstimationDone => "estimation_done",
            OrderStatus::Contract => "contract",
            OrderStatus::Design => "design",
            OrderStatus::Approval => "approval",
            OrderStatus::QueueInstall => "queue_install",
            OrderStatus::Install => "install",
            OrderStatus::Installed => "installed",
            OrderStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 紧急程度 (Urgency)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    #[default]
    Normal,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 客户类型 / 服务类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    Individual,
    Business,
}

impl CustomerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerType::Individual => "individual",
            CustomerType::Business => "business",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Apartment,
    Office,
    Scs,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Apartment => "apartment",
            ServiceType::Office => "office",
            ServiceType::Scs => "scs",
        }
    }
}

// ==========================================
// 名称冲突处理策略 (Conflict Policy)
// ==========================================
// 未显式选择时按 KeepExisting 处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictPolicy {
    #[default]
    KeepExisting,
    OverwriteFromSource,
}

impl ConflictPolicy {
    /// 由调用方参数解析策略
    ///
    /// # 参数
    /// - requested: 显式的 conflictResolution
    /// - update_names: 旧接口的 options.updateNames（仅在 requested 缺失时生效）
    pub fn resolve(requested: Option<ConflictPolicy>, update_names: Option<bool>) -> Self {
        match (requested, update_names) {
            (Some(policy), _) => policy,
            (None, Some(true)) => ConflictPolicy::OverwriteFromSource,
            _ => ConflictPolicy::KeepExisting,
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "keepExisting" | "keep_existing" | "keep" => Ok(ConflictPolicy::KeepExisting),
            "overwriteFromSource" | "overwrite_from_source" | "overwrite" => {
                Ok(ConflictPolicy::OverwriteFromSource)
            }
            other => Err(format!("未知的冲突处理策略: {}", other)),
        }
    }
}

// ==========================================
// 网络节点状态 (Node Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Existing,
    Planned,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Existing => "existing",
            NodeStatus::Planned => "planned",
        }
    }

    /// 源文件“Статус”列: 含“проектир”为规划中，其余（含空值）为已建成
    pub fn from_label(label: &str) -> Self {
        if label.to_lowercase().contains("проектир") {
            NodeStatus::Planned
        } else {
            NodeStatus::Existing
        }
    }
}

// ==========================================
// 回滚分类 (Cohort Category)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CohortCategory {
    Orders,
    Comments,
    Files,
    Users,
    Stock,
    Materials,
    Nodes,
    All,
}

impl CohortCategory {
    /// 具体分类（不含 All），按依赖顺序排列
    pub const DEPENDENCY_ORDER: [CohortCategory; 7] = [
        CohortCategory::Comments,
        CohortCategory::Files,
        CohortCategory::Orders,
        CohortCategory::Users,
        CohortCategory::Stock,
        CohortCategory::Materials,
        CohortCategory::Nodes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CohortCategory::Orders => "orders",
            CohortCategory::Comments => "comments",
            CohortCategory::Files => "files",
            CohortCategory::Users => "users",
            CohortCategory::Stock => "stock",
            CohortCategory::Materials => "materials",
            CohortCategory::Nodes => "nodes",
            CohortCategory::All => "all",
        }
    }

    /// 展开为需要执行的具体分类
    pub fn expand(&self) -> Vec<CohortCategory> {
        match self {
            CohortCategory::All => Self::DEPENDENCY_ORDER.to_vec(),
            other => vec![*other],
        }
    }
}

impl fmt::Display for CohortCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CohortCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            // applications 为旧接口名称
            "orders" | "applications" => Ok(CohortCategory::Orders),
            "comments" => Ok(CohortCategory::Comments),
            "files" => Ok(CohortCategory::Files),
            "users" => Ok(CohortCategory::Users),
            "stock" => Ok(CohortCategory::Stock),
            "materials" => Ok(CohortCategory::Materials),
            "nodes" => Ok(CohortCategory::Nodes),
            "all" => Ok(CohortCategory::All),
            other => Err(format!("未知的数据类型: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_serialization() {
        assert_eq!(
            serde_json::to_string(&Phase::Processing(SourceType::WarehouseStock)).unwrap(),
            "\"processing-stock\""
        );
        assert_eq!(serde_json::to_string(&Phase::Done).unwrap(), "\"done\"");

        let parsed: Phase = serde_json::from_str("\"processing-orders\"").unwrap();
        assert_eq!(parsed, Phase::Processing(SourceType::Orders));
    }

    #[test]
    fn test_conflict_policy_resolve() {
        assert_eq!(ConflictPolicy::resolve(None, None), ConflictPolicy::KeepExisting);
        assert_eq!(
            ConflictPolicy::resolve(None, Some(true)),
            ConflictPolicy::OverwriteFromSource
        );
        assert_eq!(
            ConflictPolicy::resolve(Some(ConflictPolicy::KeepExisting), Some(true)),
            ConflictPolicy::KeepExisting
        );
    }

    #[test]
    fn test_cohort_category_parse() {
        assert_eq!("applications".parse::<CohortCategory>(), Ok(CohortCategory::Orders));
        assert_eq!(CohortCategory::All.expand().len(), 7);
        assert_eq!(CohortCategory::All.expand()[4], CohortCategory::Stock);
        assert_eq!(CohortCategory::All.expand()[5], CohortCategory::Materials);
        assert!("everything".parse::<CohortCategory>().is_err());
    }

    #[test]
    fn test_node_status_from_label() {
        assert_eq!(NodeStatus::from_label("Проектируется"), NodeStatus::Planned);
        assert_eq!(NodeStatus::from_label("в стадии проектирования"), NodeStatus::Planned);
        assert_eq!(NodeStatus::from_label("Действующий"), NodeStatus::Existing);
        assert_eq!(NodeStatus::from_label(""), NodeStatus::Existing);
    }

    #[test]
    fn test_source_type_markers() {
        assert_eq!(SourceType::WarehouseStock.as_str(), "warehouse-stock");
        assert_eq!(SourceType::WarehouseStock.stats_key(), "stock");
        assert_eq!(
            serde_json::to_string(&SourceType::WarehouseStock).unwrap(),
            "\"warehouse-stock\""
        );
    }
}
