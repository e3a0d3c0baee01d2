// ==========================================
// 后厨出餐引擎 - 出餐项状态机
// ==========================================
// 红线: pending → in_progress → ready → delivered,严格单向线性
// 红线: 不可跳转,不可回退; delivered 之后不可再变更
// ==========================================
// 职责: 根据出餐项当前快照与目标状态,计算推进结果(纯函数)
// 输入: 当前 PreparationItem + 目标状态 + 当前时间
// 输出: TransitionPlan (需要写入 / 幂等无变化) 或 TransitionError
// 说明: 本模块不写库,compare-and-set 写入由 API 层调用仓储完成
// ==========================================

use crate::domain::prep_item::PreparationItem;
use crate::domain::types::PrepState;
use chrono::{DateTime, Utc};
use thiserror::Error;

// ==========================================
// 状态推进错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// 出餐项已交付(终态)
    #[error("出餐项已交付,不可再变更: item_id={item_id}, requested={requested}")]
    Terminal { item_id: String, requested: PrepState },

    /// 目标状态已被越过(调用方看到的状态已过期)
    #[error("目标状态已被越过: item_id={item_id}, current={current}, requested={requested}")]
    Stale {
        item_id: String,
        current: PrepState,
        requested: PrepState,
    },

    /// 跳转(越过中间状态)
    #[error("不允许跳转: item_id={item_id}, from={from} to={to}")]
    Skipped {
        item_id: String,
        from: PrepState,
        to: PrepState,
    },
}

// ==========================================
// 推进结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionPlan {
    /// 需要写入的新快照(revision 未变,由仓储在写入时 +1)
    Apply(PreparationItem),
    /// 重复请求,状态与时间戳保持原样
    Unchanged(PreparationItem),
}

impl TransitionPlan {
    pub fn item(&self) -> &PreparationItem {
        match self {
            TransitionPlan::Apply(item) | TransitionPlan::Unchanged(item) => item,
        }
    }

    pub fn is_change(&self) -> bool {
        matches!(self, TransitionPlan::Apply(_))
    }
}

// ==========================================
// ItemStateMachine - 出餐项状态机
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemStateMachine;

impl ItemStateMachine {
    /// 创建状态机
    pub fn new() -> Self {
        Self
    }

    /// 计算一次状态推进
    ///
    /// 规则(顺序执行,命中即返回):
    /// 1) 当前为 delivered → Terminal(包括再次请求 delivered)
    /// 2) 目标 == 当前 → Unchanged(幂等,不覆盖原有时间戳)
    /// 3) 目标 < 当前 → Stale
    /// 4) 目标 == 当前.next() → Apply
    ///    - → in_progress: started_at = now
    ///    - → ready: finished_at = now; started_at 缺失时补写为 now
    ///    - → delivered: 仅改状态
    /// 5) 其他(跳转) → Skipped
    pub fn plan(
        &self,
        current: &PreparationItem,
        target: PrepState,
        now: DateTime<Utc>,
    ) -> Result<TransitionPlan, TransitionError> {
        if current.state.is_terminal() {
            return Err(TransitionError::Terminal {
                item_id: current.item_id.clone(),
                requested: target,
            });
        }

        if target == current.state {
            return Ok(TransitionPlan::Unchanged(current.clone()));
        }

        if target < current.state {
            return Err(TransitionError::Stale {
                item_id: current.item_id.clone(),
                current: current.state,
                requested: target,
            });
        }

        if current.state.next() != Some(target) {
            return Err(TransitionError::Skipped {
                item_id: current.item_id.clone(),
                from: current.state,
                to: target,
            });
        }

        let mut next = current.clone();
        next.state = target;
        match target {
            PrepState::InProgress => {
                next.started_at.get_or_insert(now);
            }
            PrepState::Ready => {
                if next.started_at.is_none() {
                    tracing::debug!(item_id = %next.item_id, "started_at 缺失,出品时补写");
                }
                next.started_at.get_or_insert(now);
                next.finished_at = Some(now);
            }
            PrepState::Delivered | PrepState::Pending => {}
        }

        Ok(TransitionPlan::Apply(next))
    }
}
