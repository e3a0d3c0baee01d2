// ==========================================
// 后厨出餐引擎 - 出餐项领域模型
// ==========================================
// 红线: 出餐项只在订单拆分时创建一次,永不重建,永不删除
// 红线: station_id 创建后不可变
// 红线: finished_at 有值 ⇒ state ∈ {ready, delivered}
//       started_at 有值 ⇒ state ∈ {in_progress, ready, delivered}
// ==========================================

use crate::domain::types::PrepState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// PreparationItem - 出餐项(后厨最小工作单元)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparationItem {
    // ===== 标识 =====
    pub item_id: String,
    pub order_id: String,
    pub order_line_id: String,

    // ===== 路由 =====
    pub station_id: String,
    pub quantity: i32, // 与订单行数量一致,每个工位各带一份

    // ===== 状态 =====
    pub state: PrepState,
    pub priority: i32, // 队列主排序键(降序)
    pub notes: Option<String>,

    // ===== 计时 =====
    pub estimated_minutes: i32, // 拆分时从产品-工位关联复制,之后不再重算
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    // ===== 并发控制 =====
    pub revision: i64, // 乐观锁修订号,每次状态推进 +1
}

impl PreparationItem {
    /// 是否仍在活动队列中(未交付)
    pub fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }

    /// 校验时间戳与状态的一致性
    ///
    /// 返回违反的约束描述(用于日志/仓储校验)
    pub fn invariant_violation(&self) -> Option<String> {
        if self.finished_at.is_some() && !self.state.is_ready_or_later() {
            return Some(format!(
                "item {}: finished_at 已设置但状态为 {}",
                self.item_id, self.state
            ));
        }
        if self.started_at.is_some() && self.state == PrepState::Pending {
            return Some(format!(
                "item {}: started_at 已设置但状态为 pending",
                self.item_id
            ));
        }
        None
    }

    /// 紧急度计时起点
    ///
    /// - pending: created_at
    /// - in_progress 及之后: started_at (缺失时回退到 created_at)
    pub fn urgency_anchor(&self) -> DateTime<Utc> {
        match self.state {
            PrepState::Pending => self.created_at,
            _ => self.started_at.unwrap_or(self.created_at),
        }
    }

    /// 紧急度计时终点
    ///
    /// 已出品的出餐项计时冻结在 finished_at; 其他状态使用当前时间
    pub fn urgency_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match (self.state.is_ready_or_later(), self.finished_at) {
            (true, Some(finished)) => finished,
            _ => now,
        }
    }

    /// 有效的预计时长(<= 0 视为无预计)
    pub fn effective_estimate(&self) -> Option<i32> {
        (self.estimated_minutes > 0).then_some(self.estimated_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base_item() -> PreparationItem {
        PreparationItem {
            item_id: "ITEM_001".to_string(),
            order_id: "101".to_string(),
            order_line_id: "101-A".to_string(),
            station_id: "GRILL".to_string(),
            quantity: 2,
            state: PrepState::Pending,
            priority: 0,
            notes: None,
            estimated_minutes: 10,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            started_at: None,
            finished_at: None,
            revision: 0,
        }
    }

    #[test]
    fn test_invariant_violation_detects_bad_timestamps() {
        let mut item = base_item();
        assert!(item.invariant_violation().is_none());

        item.finished_at = Some(item.created_at);
        assert!(item.invariant_violation().is_some());

        let mut item = base_item();
        item.started_at = Some(item.created_at);
        assert!(item.invariant_violation().is_some());
    }

    #[test]
    fn test_urgency_anchor_follows_state() {
        let mut item = base_item();
        assert_eq!(item.urgency_anchor(), item.created_at);

        let started = item.created_at + Duration::minutes(3);
        item.state = PrepState::InProgress;
        item.started_at = Some(started);
        assert_eq!(item.urgency_anchor(), started);

        // started_at 缺失时回退
        item.started_at = None;
        assert_eq!(item.urgency_anchor(), item.created_at);
    }

    #[test]
    fn test_urgency_until_frozen_after_ready() {
        let mut item = base_item();
        let now = item.created_at + Duration::minutes(30);
        assert_eq!(item.urgency_until(now), now);

        let finished = item.created_at + Duration::minutes(5);
        item.state = PrepState::Ready;
        item.started_at = Some(item.created_at);
        item.finished_at = Some(finished);
        assert_eq!(item.urgency_until(now), finished);
    }

    #[test]
    fn test_effective_estimate() {
        let mut item = base_item();
        assert_eq!(item.effective_estimate(), Some(10));
        item.estimated_minutes = 0;
        assert_eq!(item.effective_estimate(), None);
    }
}
