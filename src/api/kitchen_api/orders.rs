use super::*;

use crate::domain::order::Order;
use crate::engine::urgency::UrgencyAssessment;
use crate::engine::views::OrderView;
use crate::repository::row_utils::to_db_precision;
use crate::repository::{DecompositionWrite, RepositoryError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::instrument;

/// 紧急度查询对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum UrgencyTarget {
    Item(String),
    Order(String),
}

impl KitchenApi {
    // ==========================================
    // 订单拆分接口
    // ==========================================

    /// 拆分订单(幂等)
    ///
    /// # 流程
    /// 1. 已有出餐项 → 直接返回已有出餐项(仍为 revision 0 的重新发布 Created,hub 去重)
    /// 2. 订单头未落库 → 先写入订单(并发写入时忽略唯一约束冲突)
    /// 3. 引擎拆分 → 单事务写入(事务内再次检查幂等)
    /// 4. 发布 Created 事件
    ///
    /// # 错误
    /// - InvalidOrder: 无订单行 / 订单行非法 / 关联指向不存在的工位
    /// - UnknownProduct: 关联查询本身失败
    /// - StoreUnavailable: 存储或事件通道不可用
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub fn decompose_order(&self, order: &Order) -> KitchenResult<Vec<PreparationItem>> {
        let now = to_db_precision(Utc::now());

        let existing = self.item_repo.find_by_order(&order.order_id)?;
        if !existing.is_empty() {
            tracing::debug!(items = existing.len(), "订单已拆分,返回已有出餐项");
            self.publish_created(&existing, now)?;
            return Ok(existing);
        }

        let items = self
            .decomposer
            .decompose(order, self.assignment_repo.as_ref(), now)
            .map_err(|e| {
                tracing::warn!(error = %e, "订单拆分失败");
                KitchenError::from(e)
            })?;

        self.ensure_order_recorded(order)?;

        let written = self
            .item_repo
            .insert_for_order(&order.order_id, &items)
            .map_err(|e| match e {
                RepositoryError::ForeignKeyViolation(msg) => KitchenError::InvalidOrder(format!(
                    "订单{}的出餐项引用了不存在的工位或订单行: {}",
                    order.order_id, msg
                )),
                other => other.into(),
            })?;

        let items = match written {
            DecompositionWrite::Inserted(items) => {
                tracing::info!(items = items.len(), "出餐项已写入");
                items
            }
            DecompositionWrite::AlreadyDecomposed(items) => {
                tracing::debug!(items = items.len(), "并发拆分已先完成,返回已有出餐项");
                items
            }
        };

        self.publish_created(&items, now)?;
        Ok(items)
    }

    /// 按订单ID从存储加载订单并拆分
    pub fn decompose_order_by_id(&self, order_id: &str) -> KitchenResult<Vec<PreparationItem>> {
        let order = self
            .order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| KitchenError::NotFound(format!("订单{}不存在", order_id)))?;
        self.decompose_order(&order)
    }

    fn ensure_order_recorded(&self, order: &Order) -> KitchenResult<()> {
        if self.order_repo.find_by_id(&order.order_id)?.is_some() {
            return Ok(());
        }
        match self.order_repo.insert_order(order) {
            Ok(()) => Ok(()),
            Err(RepositoryError::UniqueConstraintViolation(msg)) => {
                // 只有订单头确实已被并发写入时才忽略冲突
                if self.order_repo.find_by_id(&order.order_id)?.is_some() {
                    tracing::debug!("订单已被并发写入");
                    Ok(())
                } else {
                    Err(KitchenError::InvalidOrder(format!(
                        "订单{}写入冲突: {}",
                        order.order_id, msg
                    )))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn publish_created(&self, items: &[PreparationItem], now: DateTime<Utc>) -> KitchenResult<()> {
        // 已推进的出餐项不再以 Created 发布
        let fresh: Vec<PreparationItem> = items
            .iter()
            .filter(|i| i.revision == 0)
            .cloned()
            .collect();
        let Some(first) = fresh.first() else {
            return Ok(());
        };
        let progress = self.recompute_progress(&first.order_id)?;
        self.publish_items(ChangeKind::Created, &fresh, progress, now)
    }

    // ==========================================
    // 进度与紧急度接口
    // ==========================================

    /// 查询订单进度
    ///
    /// 没有出餐项的订单(含未知订单)返回 0 / 0 / 0%
    pub fn get_order_progress(&self, order_id: &str) -> KitchenResult<OrderProgress> {
        if order_id.trim().is_empty() {
            return Err(KitchenError::InvalidInput("order_id不能为空".to_string()));
        }
        self.recompute_progress(order_id)
    }

    /// 查询紧急度(以当前时间计算)
    pub fn get_urgency(&self, target: &UrgencyTarget) -> KitchenResult<UrgencyAssessment> {
        self.get_urgency_at(target, Utc::now())
    }

    /// 查询指定时间的紧急度
    pub fn get_urgency_at(
        &self,
        target: &UrgencyTarget,
        now: DateTime<Utc>,
    ) -> KitchenResult<UrgencyAssessment> {
        match target {
            UrgencyTarget::Item(item_id) => {
                let item = self
                    .item_repo
                    .find_by_id(item_id)?
                    .ok_or_else(|| KitchenError::NotFound(format!("出餐项{}不存在", item_id)))?;
                Ok(self.clock.for_item(&item, now))
            }
            UrgencyTarget::Order(order_id) => {
                let order = self
                    .order_repo
                    .find_by_id(order_id)?
                    .ok_or_else(|| KitchenError::NotFound(format!("订单{}不存在", order_id)))?;
                Ok(self.clock.for_order(&order, now))
            }
        }
    }

    // ==========================================
    // 订单看板接口
    // ==========================================

    /// 订单看板(以当前时间计算紧急度)
    pub fn get_order_view(&self) -> KitchenResult<Vec<OrderView>> {
        self.get_order_view_at(Utc::now())
    }

    /// 指定时间的订单看板
    pub fn get_order_view_at(&self, now: DateTime<Utc>) -> KitchenResult<Vec<OrderView>> {
        let items = self.item_repo.find_for_active_orders()?;
        let order_ids: Vec<String> = items
            .iter()
            .map(|i| i.order_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let orders = self.order_repo.find_headers_by_ids(&order_ids)?;
        Ok(self.projector.order_view(&orders, &items, now))
    }
}
