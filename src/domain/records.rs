// ==========================================
// 工单系统 - 持久化实体
// ==========================================
// 职责: 导入流程写入/比对的实体结构（工单、评论、附件、用户、物料、库存、网络节点）
// 说明: 比较字段只包含映射来源字段，不含 id / 时间戳 / 来源标记
// ==========================================

use crate::domain::types::{OrderStatus, Urgency};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 来源标记（import_source + import_job_id）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: String,
    pub job_id: String,
}

// ==========================================
// 工单 (Application)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationFields {
    pub legacy_stage: Option<String>,
    pub application_number: i64,
    pub customer_type: String,
    pub customer_fullname: String,
    pub customer_phone: String,
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
    pub service_type: String,
    pub status: String,
    pub urgency: String,
    pub street_and_house: Option<String>,
    pub address_details: Option<String>,
    pub client_comment: Option<String>,
}

impl ApplicationFields {
    pub fn set_stage(&mut self, status: OrderStatus, urgency: Urgency) {
        self.status = status.as_str().to_string();
        self.urgency = urgency.as_str().to_string();
    }
}

/// 已存在的工单（按 legacy_id 查出）
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingApplication {
    pub id: String,
    pub fields: ApplicationFields,
    pub legacy_body: Option<String>,
}

// ==========================================
// 评论 (Comment)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentFields {
    pub application_id: String,
    pub user_name: String,
    pub comment: String,
}

// ==========================================
// 附件元数据 (File)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFields {
    pub application_id: String,
    pub legacy_path: Option<String>,
    pub original_filename: String,
    pub stored_filename: String,
    pub file_size: i64,
    pub mime_type: String,
    pub description: Option<String>,
}

// ==========================================
// 用户 (User)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFields {
    pub email: String,
    pub full_name: String,
    pub active: bool,
    pub legacy_last_access: Option<String>,
    pub legacy_last_login: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingUser {
    pub id: String,
    pub legacy_uid: Option<i64>,
    pub fields: UserFields,
}

// ==========================================
// 物料 / 库存 (Material / Stock)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub id: String,
    /// 目录导入允许无编码的物料（此时按名称匹配）
    pub code: Option<String>,
    pub name: String,
    pub unit: String,
    pub price: f64,
    /// 目录导入的全局库存数量（不同于各仓库库存行）
    pub stock_quantity: f64,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRow {
    pub warehouse_id: String,
    pub material_id: String,
    pub quantity: f64,
}

// ==========================================
// 网络节点 (Network Node)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFields {
    pub address: String,
    pub location_details: Option<String>,
    pub comm_info: Option<String>,
    pub status: String,
    pub contract_link: Option<String>,
    /// YYYY-MM-DD
    pub node_created_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingNode {
    pub id: String,
    pub fields: NodeFields,
}

// ==========================================
// 冲突 (Conflict)
// ==========================================

/// 名称冲突：文件中的名称与库中名称不一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictEntry {
    pub code: String,
    pub existing_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub conflicts: Vec<ConflictEntry>,
    pub new_materials: usize,
    pub existing_materials: usize,
    pub total: usize,
}

impl ConflictReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

// ==========================================
// 回滚报告 (Reverse Report)
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseReport {
    pub deleted: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReverseReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}
