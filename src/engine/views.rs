// ==========================================
// 后厨出餐引擎 - 看板投影
// ==========================================
// 红线: 纯投影,不持有状态,任何时候都可从当前数据重建
// ==========================================
// 职责:
//   - 工位队列: 按工位过滤,排除 delivered,分 pending / in_progress / ready 三栏
//   - 订单视图: 活动出餐项按订单分组,附进度与紧急度
// 排序:
//   - 队列每栏: priority DESC, created_at ASC, item_id ASC
//   - 订单: 紧急度 DESC, placed_at ASC, order_id ASC
// ==========================================

use crate::domain::order::Order;
use crate::domain::prep_item::PreparationItem;
use crate::domain::progress::OrderProgress;
use crate::domain::types::{PrepState, UrgencyTier};
use crate::engine::progress::ProgressAggregator;
use crate::engine::urgency::UrgencyClock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

// ==========================================
// 投影结果
// ==========================================

/// 单工位队列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationQueue {
    pub station_id: String,
    pub pending: Vec<PreparationItem>,
    pub in_progress: Vec<PreparationItem>,
    pub ready: Vec<PreparationItem>,
}

impl StationQueue {
    pub fn total(&self) -> usize {
        self.pending.len() + self.in_progress.len() + self.ready.len()
    }
}

/// 订单看板条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub order: Order,
    pub items: Vec<PreparationItem>, // 仅活动(未交付)出餐项
    pub progress: OrderProgress,     // 基于全部出餐项
    pub urgency: UrgencyTier,
}

// ==========================================
// DisplayProjector - 看板投影器
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayProjector {
    clock: UrgencyClock,
    aggregator: ProgressAggregator,
}

impl DisplayProjector {
    pub fn new(clock: UrgencyClock) -> Self {
        Self {
            clock,
            aggregator: ProgressAggregator::new(),
        }
    }

    /// 工位队列投影
    pub fn station_queue<'a, I>(&self, station_id: &str, items: I) -> StationQueue
    where
        I: IntoIterator<Item = &'a PreparationItem>,
    {
        let mut queue = StationQueue {
            station_id: station_id.to_string(),
            pending: Vec::new(),
            in_progress: Vec::new(),
            ready: Vec::new(),
        };

        for item in items.into_iter().filter(|i| i.station_id == station_id) {
            match item.state {
                PrepState::Pending => queue.pending.push(item.clone()),
                PrepState::InProgress => queue.in_progress.push(item.clone()),
                PrepState::Ready => queue.ready.push(item.clone()),
                PrepState::Delivered => {}
            }
        }

        queue.pending.sort_by(queue_order);
        queue.in_progress.sort_by(queue_order);
        queue.ready.sort_by(queue_order);
        queue
    }

    /// 订单视图投影
    ///
    /// # 参数
    /// - orders: 订单头
    /// - items: 这些订单的全部出餐项(含已交付,进度需要全集)
    ///
    /// 没有活动出餐项的订单不出现在结果中; 找不到订单头的出餐项被忽略
    pub fn order_view(
        &self,
        orders: &[Order],
        items: &[PreparationItem],
        now: DateTime<Utc>,
    ) -> Vec<OrderView> {
        let mut grouped: HashMap<&str, Vec<&PreparationItem>> = HashMap::new();
        for item in items {
            grouped.entry(item.order_id.as_str()).or_default().push(item);
        }

        let mut views: Vec<OrderView> = Vec::new();
        for order in orders {
            let Some(all_items) = grouped.get(order.order_id.as_str()) else {
                continue;
            };

            let mut active: Vec<PreparationItem> = all_items
                .iter()
                .filter(|i| i.is_active())
                .map(|i| (*i).clone())
                .collect();
            if active.is_empty() {
                continue;
            }
            active.sort_by(queue_order);

            let progress = self.aggregator.compute(all_items.iter().copied());
            let urgency = self.clock.for_order_view(order, &active, now);

            views.push(OrderView {
                order: order.clone(),
                items: active,
                progress,
                urgency,
            });
        }

        if grouped.len() > views.len() {
            let known: std::collections::HashSet<&str> =
                orders.iter().map(|o| o.order_id.as_str()).collect();
            let orphans = grouped.keys().filter(|id| !known.contains(*id)).count();
            if orphans > 0 {
                tracing::warn!(orphans, "存在找不到订单头的出餐项,已忽略");
            }
        }

        views.sort_by(|a, b| {
            b.urgency
                .cmp(&a.urgency)
                .then_with(|| a.order.placed_at.cmp(&b.order.placed_at))
                .then_with(|| a.order.order_id.cmp(&b.order.order_id))
        });
        views
    }
}

fn queue_order(a: &PreparationItem, b: &PreparationItem) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.item_id.cmp(&b.item_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::OrderStatus;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 19, 0, 0).unwrap()
    }

    fn item(id: &str, order: &str, station: &str, state: PrepState, priority: i32, age_min: i64) -> PreparationItem {
        let created_at = now() - Duration::minutes(age_min);
        PreparationItem {
            item_id: id.to_string(),
            order_id: order.to_string(),
            order_line_id: format!("{}-L", order),
            station_id: station.to_string(),
            quantity: 1,
            state,
            priority,
            notes: None,
            estimated_minutes: 30,
            created_at,
            started_at: (state >= PrepState::InProgress).then_some(created_at),
            finished_at: (state >= PrepState::Ready).then_some(created_at + Duration::minutes(1)),
            revision: 0,
        }
    }

    fn order(id: &str, placed_min_ago: i64) -> Order {
        Order {
            order_id: id.to_string(),
            placed_at: now() - Duration::minutes(placed_min_ago),
            customer_name: Some("Guest".to_string()),
            delivery_address: None,
            promised_minutes: None,
            order_status: OrderStatus::InPrep,
            priority: 0,
            lines: Vec::new(),
        }
    }

    #[test]
    fn test_station_queue_buckets_and_order() {
        let items = vec![
            item("I1", "101", "GRILL", PrepState::Pending, 0, 5),
            item("I2", "102", "GRILL", PrepState::Pending, 5, 1),
            item("I3", "103", "GRILL", PrepState::Pending, 0, 9),
            item("I4", "101", "GRILL", PrepState::Ready, 0, 3),
            item("I5", "101", "GRILL", PrepState::Delivered, 0, 3),
            item("I6", "101", "PLATING", PrepState::Pending, 0, 3),
        ];
        let queue = DisplayProjector::default().station_queue("GRILL", &items);

        let ids: Vec<_> = queue.pending.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["I2", "I3", "I1"]);
        assert!(queue.in_progress.is_empty());
        assert_eq!(queue.ready.len(), 1);
        assert_eq!(queue.total(), 4);
    }

    #[test]
    fn test_order_view_sorted_by_urgency_then_age() {
        let orders = vec![order("101", 2), order("102", 4), order("103", 10)];
        let items = vec![
            item("I1", "101", "GRILL", PrepState::Pending, 0, 2),
            item("I2", "102", "GRILL", PrepState::Pending, 0, 4),
            item("I3", "103", "GRILL", PrepState::Pending, 0, 10), // warning
        ];
        let views = DisplayProjector::default().order_view(&orders, &items, now());
        let ids: Vec<_> = views.iter().map(|v| v.order.order_id.as_str()).collect();
        assert_eq!(ids, vec!["103", "102", "101"]);
        assert_eq!(views[0].urgency, UrgencyTier::Warning);
    }

    #[test]
    fn test_order_view_progress_uses_all_items() {
        let orders = vec![order("101", 3), order("102", 3)];
        let items = vec![
            item("I1", "101", "GRILL", PrepState::Delivered, 0, 3),
            item("I2", "101", "PLATING", PrepState::Pending, 0, 3),
            item("I3", "102", "GRILL", PrepState::Delivered, 0, 3),
        ];
        let views = DisplayProjector::default().order_view(&orders, &items, now());

        assert_eq!(views.len(), 1, "全部交付的订单不在看板上");
        assert_eq!(views[0].items.len(), 1);
        assert_eq!(views[0].progress.total_items, 2);
        assert_eq!(views[0].progress.percent_complete, 50);
    }
}
