// ==========================================
// 后厨出餐引擎 - 订单进度聚合
// ==========================================
// 红线: 纯函数,不持有状态; 每次变更都从出餐项全集重算,不做增量修补
// ==========================================

use crate::domain::prep_item::PreparationItem;
use crate::domain::progress::OrderProgress;
use std::collections::HashMap;

// ==========================================
// ProgressAggregator - 进度聚合器
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressAggregator;

impl ProgressAggregator {
    pub fn new() -> Self {
        Self
    }

    /// 计算单个订单的进度
    ///
    /// - items_ready_or_later: ready + delivered 数量
    /// - percent_complete = round(100 * ready_or_later / total), total = 0 时为 0
    pub fn compute<'a, I>(&self, items: I) -> OrderProgress
    where
        I: IntoIterator<Item = &'a PreparationItem>,
    {
        let mut total = 0usize;
        let mut done = 0usize;
        for item in items {
            total += 1;
            if item.state.is_ready_or_later() {
                done += 1;
            }
        }

        OrderProgress {
            total_items: total,
            items_ready_or_later: done,
            percent_complete: Self::percent(done, total),
        }
    }

    /// 按订单分组计算进度
    pub fn compute_by_order(&self, items: &[PreparationItem]) -> HashMap<String, OrderProgress> {
        let mut grouped: HashMap<&str, Vec<&PreparationItem>> = HashMap::new();
        for item in items {
            grouped.entry(item.order_id.as_str()).or_default().push(item);
        }
        grouped
            .into_iter()
            .map(|(order_id, group)| (order_id.to_string(), self.compute(group)))
            .collect()
    }

    /// 四舍五入的整数百分比(半数进位)
    fn percent(done: usize, total: usize) -> u8 {
        if total == 0 {
            return 0;
        }
        let pct = (200 * done + total) / (2 * total);
        pct.min(100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::PrepState;
    use chrono::Utc;

    fn item(order_id: &str, state: PrepState) -> PreparationItem {
        PreparationItem {
            item_id: uuid::Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            order_line_id: format!("{}-L", order_id),
            station_id: "GRILL".to_string(),
            quantity: 1,
            state,
            priority: 0,
            notes: None,
            estimated_minutes: 5,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            revision: 0,
        }
    }

    #[test]
    fn test_ready_and_delivered_both_count() {
        let items = vec![
            item("101", PrepState::Pending),
            item("101", PrepState::InProgress),
            item("101", PrepState::Ready),
            item("101", PrepState::Delivered),
        ];
        let progress = ProgressAggregator::new().compute(&items);
        assert_eq!(progress.total_items, 4);
        assert_eq!(progress.items_ready_or_later, 2);
        assert_eq!(progress.percent_complete, 50);
    }

    #[test]
    fn test_empty_order_is_zero_percent() {
        let progress = ProgressAggregator::new().compute(&Vec::new());
        assert_eq!(progress, OrderProgress::default());
        assert!(!progress.is_complete());
    }

    #[test]
    fn test_rounding() {
        assert_eq!(ProgressAggregator::percent(1, 3), 33);
        assert_eq!(ProgressAggregator::percent(2, 3), 67);
        assert_eq!(ProgressAggregator::percent(1, 8), 13); // 12.5 → 13
        assert_eq!(ProgressAggregator::percent(3, 3), 100);
    }

    #[test]
    fn test_compute_by_order() {
        let items = vec![
            item("101", PrepState::Ready),
            item("101", PrepState::Pending),
            item("102", PrepState::Delivered),
        ];
        let map = ProgressAggregator::new().compute_by_order(&items);
        assert_eq!(map["101"].percent_complete, 50);
        assert!(map["102"].is_complete());
    }
}
