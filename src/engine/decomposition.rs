// ==========================================
// 后厨出餐引擎 - 订单拆分
// ==========================================
// 红线: 一个订单行 × 一个工位 = 一个出餐项(不按份数拆分)
// 红线: estimated_minutes 拆分时从关联复制,之后不再重算
// ==========================================
// 职责: 把已接单的订单拆成各工位的出餐项(纯计算,不写库)
// 输入: Order(含订单行) + 产品→工位关联查询
// 输出: Vec<PreparationItem>,全部为 pending / revision 0
// 说明: 幂等由 API 层在写库事务内保证
// ==========================================

use crate::domain::order::Order;
use crate::domain::prep_item::PreparationItem;
use crate::domain::station::StationAssignment;
use crate::domain::types::PrepState;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

/// 关联查询失败(协作方不可用等)
pub type LookupError = Box<dyn Error + Send + Sync>;

// ==========================================
// 产品-工位关联查询 Trait
// ==========================================

/// 产品→工位关联查询
///
/// Engine 层定义,仓储层实现(`AssignmentRepository`)
///
/// # 返回
/// - `Ok(vec![])`: 产品没有任何工位关联(该订单行不需要后厨制作)
/// - `Err`: 查询本身失败,拆分以 UnknownProduct 终止
pub trait StationAssignmentLookup: Send + Sync {
    fn assignments_for(&self, product_id: &str) -> Result<Vec<StationAssignment>, LookupError>;
}

// ==========================================
// 拆分错误
// ==========================================
#[derive(Error, Debug)]
pub enum DecompositionError {
    #[error("订单不合法: order_id={order_id}, {reason}")]
    InvalidOrder { order_id: String, reason: String },

    #[error("产品工位关联查询失败: product_id={product_id}, {reason}")]
    UnknownProduct { product_id: String, reason: String },
}

// ==========================================
// OrderDecomposer - 订单拆分器
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderDecomposer;

impl OrderDecomposer {
    pub fn new() -> Self {
        Self
    }

    /// 拆分订单
    ///
    /// 校验:
    /// - 订单没有订单行 → InvalidOrder
    /// - 订单行数量 <= 0 或 order_id 不一致 → InvalidOrder
    /// - order_line_id 重复 → InvalidOrder
    ///
    /// 同一产品在多个订单行中出现时只查询一次关联
    #[instrument(skip(self, order, lookup), fields(order_id = %order.order_id, lines = order.lines.len()))]
    pub fn decompose(
        &self,
        order: &Order,
        lookup: &dyn StationAssignmentLookup,
        now: DateTime<Utc>,
    ) -> Result<Vec<PreparationItem>, DecompositionError> {
        self.validate(order)?;

        let mut cache: HashMap<&str, Vec<StationAssignment>> = HashMap::new();
        let mut items = Vec::new();

        for line in &order.lines {
            if !cache.contains_key(line.product_id.as_str()) {
                let assignments = lookup.assignments_for(&line.product_id).map_err(|e| {
                    DecompositionError::UnknownProduct {
                        product_id: line.product_id.clone(),
                        reason: e.to_string(),
                    }
                })?;
                cache.insert(line.product_id.as_str(), assignments);
            }

            let assignments = &cache[line.product_id.as_str()];
            if assignments.is_empty() {
                tracing::debug!(
                    order_line_id = %line.order_line_id,
                    product_id = %line.product_id,
                    "产品无工位关联,订单行不生成出餐项"
                );
                continue;
            }

            for assignment in assignments {
                items.push(PreparationItem {
                    item_id: Uuid::new_v4().to_string(),
                    order_id: order.order_id.clone(),
                    order_line_id: line.order_line_id.clone(),
                    station_id: assignment.station_id.clone(),
                    quantity: line.quantity,
                    state: PrepState::Pending,
                    priority: order.priority,
                    notes: line.notes.clone(),
                    estimated_minutes: assignment.estimated_minutes,
                    created_at: now,
                    started_at: None,
                    finished_at: None,
                    revision: 0,
                });
            }
        }

        tracing::info!(items = items.len(), "订单拆分完成");
        Ok(items)
    }

    fn validate(&self, order: &Order) -> Result<(), DecompositionError> {
        let invalid = |reason: String| DecompositionError::InvalidOrder {
            order_id: order.order_id.clone(),
            reason,
        };

        if order.order_id.trim().is_empty() {
            return Err(invalid("order_id 为空".to_string()));
        }
        if !order.has_lines() {
            return Err(invalid("订单没有订单行".to_string()));
        }
        let mut seen_lines = HashSet::new();
        for line in &order.lines {
            if !seen_lines.insert(line.order_line_id.as_str()) {
                return Err(invalid(format!("订单行 {} 重复", line.order_line_id)));
            }
            if line.order_id != order.order_id {
                return Err(invalid(format!(
                    "订单行 {} 属于订单 {}",
                    line.order_line_id, line.order_id
                )));
            }
            if line.quantity <= 0 {
                return Err(invalid(format!(
                    "订单行 {} 数量非法: {}",
                    line.order_line_id, line.quantity
                )));
            }
            if line.product_id.trim().is_empty() {
                return Err(invalid(format!("订单行 {} 缺少 product_id", line.order_line_id)));
            }
        }
        Ok(())
    }
}
