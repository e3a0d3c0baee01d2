// ==========================================
// 后厨出餐引擎 - 订单进度(派生对象,不落库)
// ==========================================

use serde::{Deserialize, Serialize};

/// 订单出餐进度
///
/// 由 `engine::progress::ProgressAggregator` 从出餐项全集重新计算,不做增量修补
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderProgress {
    pub total_items: usize,
    pub items_ready_or_later: usize,
    pub percent_complete: u8,
}

impl OrderProgress {
    /// 是否全部出品
    pub fn is_complete(&self) -> bool {
        self.total_items > 0 && self.items_ready_or_later == self.total_items
    }
}
