// ==========================================
// 工单系统 - 阶段/状态映射器
// ==========================================
// 职责: 旧系统阶段标签 -> 目标状态 + 紧急程度
// 规则:
// - 精确匹配（区分大小写），不做模糊归并
// - 未知标签返回 UnmappedStage，由调用方计入行级错误
// - 映射表为不可变值，构建一次后显式传入
// ==========================================

use crate::domain::types::{OrderStatus, Urgency};
use std::collections::HashMap;
use thiserror::Error;

/// 映射规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageMappingRule {
    pub status: OrderStatus,
    pub urgency: Urgency,
}

/// 未知阶段标签
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("未知的阶段标签: {0}")]
pub struct UnmappedStage(pub String);

/// 阶段映射表
#[derive(Debug, Clone)]
pub struct StageTable {
    rules: HashMap<&'static str, StageMappingRule>,
}

const LEGACY_STAGES: &[(&str, OrderStatus, Urgency)] = &[
    ("1. Новая заявка", OrderStatus::New, Urgency::Normal),
    ("1.1. Собираем группу", OrderStatus::NoTech, Urgency::Normal),
    ("1.2. Аварийная заявка", OrderStatus::New, Urgency::Critical),
    ("1.3. Заказчик думает", OrderStatus::Thinking, Urgency::Normal),
    ("1.4. Потенциальный клиент", OrderStatus::Thinking, Urgency::Normal),
    ("1.5. Переоформление договора", OrderStatus::Contract, Urgency::Normal),
    ("2. Расчет стоимости", OrderStatus::Estimation, Urgency::Normal),
    ("2.1. Расчет выполнен", OrderStatus::EstimationDone, Urgency::Normal),
    ("3. Заключение договора", OrderStatus::Contract, Urgency::Normal),
    ("4. Ждем оплату", OrderStatus::Contract, Urgency::Normal),
    ("5. Проектирование", OrderStatus::Design, Urgency::Normal),
    ("5.1. Согласование", OrderStatus::Approval, Urgency::Normal),
    ("6. Очередь на монтаж", OrderStatus::QueueInstall, Urgency::Normal),
    ("7. Монтаж", OrderStatus::Install, Urgency::Normal),
    ("8. Пусконаладка", OrderStatus::Install, Urgency::Normal),
    ("9. Выполнена", OrderStatus::Installed, Urgency::Normal),
    ("10. Отказ", OrderStatus::Rejected, Urgency::Normal),
    ("11. Нет техн. возможности", OrderStatus::NoTech, Urgency::Normal),
    ("12. Дубль заявки", OrderStatus::Rejected, Urgency::Normal),
];

impl StageTable {
    /// 旧系统的固定阶段表
    pub fn legacy() -> Self {
        let rules = LEGACY_STAGES
            .iter()
            .map(|(label, status, urgency)| {
                (
                    *label,
                    StageMappingRule {
                        status: *status,
                        urgency: *urgency,
                    },
                )
            })
            .collect();
        Self { rules }
    }

    /// 查表
    pub fn map(&self, label: &str) -> Result<StageMappingRule, UnmappedStage> {
        self.rules
            .get(label)
            .copied()
            .ok_or_else(|| UnmappedStage(label.to_string()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for StageTable {
    fn default() -> Self {
        Self::legacy()
    }
}
