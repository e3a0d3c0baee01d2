// ==========================================
// 后厨出餐引擎 - 紧急度判定
// ==========================================
// 红线: 紧急度是"等级制",不是评分制
// 红线: 只做判定,不推进状态,不持久化计时器
// ==========================================
// 职责: 根据已耗时与预计/承诺时长,判定 normal / warning / critical
// 输入: 出餐项或订单 + 当前时间
// 输出: UrgencyAssessment (等级 + 已耗时 + 原因JSON)
// ==========================================

use crate::domain::order::Order;
use crate::domain::prep_item::PreparationItem;
use crate::domain::types::UrgencyTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

/// 默认 warning 阈值(分钟)
pub const DEFAULT_WARNING_MINUTES: i64 = 8;
/// 默认 critical 阈值(分钟)
pub const DEFAULT_CRITICAL_MINUTES: i64 = 12;

// ==========================================
// UrgencyPolicy - 全局阈值(整个后厨一套)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencyPolicy {
    pub warning_minutes: i64,
    pub critical_minutes: i64,
}

impl Default for UrgencyPolicy {
    fn default() -> Self {
        Self {
            warning_minutes: DEFAULT_WARNING_MINUTES,
            critical_minutes: DEFAULT_CRITICAL_MINUTES,
        }
    }
}

impl UrgencyPolicy {
    /// 构造阈值; 非法组合(非正数 / warning >= critical)返回 None
    pub fn new(warning_minutes: i64, critical_minutes: i64) -> Option<Self> {
        if warning_minutes <= 0 || critical_minutes <= 0 || warning_minutes >= critical_minutes {
            return None;
        }
        Some(Self {
            warning_minutes,
            critical_minutes,
        })
    }

    /// 构造阈值,非法时回退默认值并告警
    pub fn or_default(warning_minutes: i64, critical_minutes: i64) -> Self {
        Self::new(warning_minutes, critical_minutes).unwrap_or_else(|| {
            tracing::warn!(
                warning_minutes,
                critical_minutes,
                "紧急度阈值非法,回退默认值 {}/{}",
                DEFAULT_WARNING_MINUTES,
                DEFAULT_CRITICAL_MINUTES
            );
            Self::default()
        })
    }
}

// ==========================================
// 判定结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencyAssessment {
    pub tier: UrgencyTier,
    pub elapsed_seconds: i64,
    pub estimate_minutes: Option<i64>,
    pub reason: String, // JSON: {tier, primary_reason, ...}
}

// ==========================================
// UrgencyClock - 紧急度时钟
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct UrgencyClock {
    policy: UrgencyPolicy,
}

impl UrgencyClock {
    pub fn new(policy: UrgencyPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> UrgencyPolicy {
        self.policy
    }

    /// 判定等级
    ///
    /// 规则(顺序执行,命中即返回):
    /// 1) elapsed >= critical 阈值 → CRITICAL_ABSOLUTE
    /// 2) 有预计时长 且 elapsed >= 预计 → CRITICAL_OVER_ESTIMATE
    /// 3) elapsed >= warning 阈值 → WARNING_ELAPSED
    /// 4) 其他 → NORMAL
    ///
    /// 边界处理:
    /// - elapsed 为负(时钟回拨) → 按 0 处理
    /// - estimate <= 0 → 视为无预计
    pub fn classify(&self, elapsed_seconds: i64, estimate_minutes: Option<i64>) -> UrgencyAssessment {
        let elapsed_seconds = elapsed_seconds.max(0);
        let estimate_minutes = estimate_minutes.filter(|m| *m > 0);
        let warning_secs = self.policy.warning_minutes * 60;
        let critical_secs = self.policy.critical_minutes * 60;

        let (tier, primary_reason) = if elapsed_seconds >= critical_secs {
            (UrgencyTier::Critical, "CRITICAL_ABSOLUTE")
        } else if estimate_minutes.is_some_and(|m| elapsed_seconds >= m * 60) {
            (UrgencyTier::Critical, "CRITICAL_OVER_ESTIMATE")
        } else if elapsed_seconds >= warning_secs {
            (UrgencyTier::Warning, "WARNING_ELAPSED")
        } else {
            (UrgencyTier::Normal, "NORMAL")
        };

        let reason = json!({
            "tier": tier.to_string(),
            "primary_reason": primary_reason,
            "details": {
                "elapsed_seconds": elapsed_seconds,
                "estimate_minutes": estimate_minutes,
                "warning_minutes": self.policy.warning_minutes,
                "critical_minutes": self.policy.critical_minutes,
            }
        });

        UrgencyAssessment {
            tier,
            elapsed_seconds,
            estimate_minutes,
            reason: reason.to_string(),
        }
    }

    /// 出餐项紧急度
    ///
    /// 起点: pending 用 created_at, 之后用 started_at; 已出品的计时冻结在 finished_at
    #[instrument(skip(self, item), fields(item_id = %item.item_id, state = %item.state))]
    pub fn for_item(&self, item: &PreparationItem, now: DateTime<Utc>) -> UrgencyAssessment {
        let elapsed = item.urgency_until(now) - item.urgency_anchor();
        self.classify(
            elapsed.num_seconds(),
            item.effective_estimate().map(i64::from),
        )
    }

    /// 订单紧急度
    ///
    /// 起点: placed_at; 预计: promised_minutes
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub fn for_order(&self, order: &Order, now: DateTime<Utc>) -> UrgencyAssessment {
        let elapsed = now - order.placed_at;
        self.classify(
            elapsed.num_seconds(),
            order.promised_minutes.map(i64::from),
        )
    }

    /// 订单在看板上的展示等级 = max(订单自身, 其活动出餐项)
    pub fn for_order_view<'a, I>(&self, order: &Order, items: I, now: DateTime<Utc>) -> UrgencyTier
    where
        I: IntoIterator<Item = &'a PreparationItem>,
    {
        items
            .into_iter()
            .filter(|item| item.is_active())
            .map(|item| self.for_item(item, now).tier)
            .fold(self.for_order(order, now).tier, std::cmp::max)
    }
}
