use super::*;

use crate::domain::types::PrepState;
use crate::engine::state_machine::TransitionPlan;
use crate::repository::row_utils::to_db_precision;
use crate::repository::RepositoryError;
use tracing::instrument;

impl KitchenApi {
    // ==========================================
    // 状态推进接口
    // ==========================================

    /// 推进出餐项状态(compare-and-set)
    ///
    /// # 返回
    /// - Ok(PreparationItem): 写入后(或幂等重放时已存储)的快照
    ///
    /// # 错误
    /// - TerminalState: 出餐项已交付
    /// - StaleTransition: 目标状态已被越过 / 并发写入抢先
    /// - IllegalTransition: 跳转
    /// - NotFound: item_id 不存在
    /// - StoreUnavailable: 存储或事件通道不可用
    pub fn transition(&self, item_id: &str, target: PrepState) -> KitchenResult<PreparationItem> {
        self.transition_at(item_id, target, Utc::now())
    }

    /// 指定时间的状态推进(测试/回放用)
    #[instrument(skip(self, now), fields(target = %target))]
    pub fn transition_at(
        &self,
        item_id: &str,
        target: PrepState,
        now: DateTime<Utc>,
    ) -> KitchenResult<PreparationItem> {
        if item_id.trim().is_empty() {
            return Err(KitchenError::InvalidInput("item_id不能为空".to_string()));
        }

        let now = to_db_precision(now);
        let current = self.load_item(item_id)?;

        let plan = self.state_machine.plan(&current, target, now).map_err(|e| {
            tracing::warn!(error = %e, "状态推进被拒绝");
            KitchenError::from(e)
        })?;

        let next = match plan {
            TransitionPlan::Unchanged(item) => {
                tracing::debug!(state = %item.state, "重复请求,状态不变");
                self.publish_transition(&item, now)?;
                return Ok(item);
            }
            TransitionPlan::Apply(next) => next,
        };

        match self
            .item_repo
            .compare_and_set(&next, current.state, current.revision)
        {
            Ok(written) => {
                tracing::info!(
                    order_id = %written.order_id,
                    station_id = %written.station_id,
                    from = %current.state,
                    to = %written.state,
                    revision = written.revision,
                    "出餐项状态已推进"
                );
                self.publish_transition(&written, now)?;
                Ok(written)
            }
            Err(RepositoryError::OptimisticLockFailure { .. }) => {
                self.resolve_lost_race(item_id, target, now)
            }
            Err(e) => {
                tracing::error!(error = %e, "状态写入失败");
                Err(e.into())
            }
        }
    }

    /// 并发写入抢先后的判定: 只重读一次,不再写入
    fn resolve_lost_race(
        &self,
        item_id: &str,
        target: PrepState,
        now: DateTime<Utc>,
    ) -> KitchenResult<PreparationItem> {
        let fresh = self.load_item(item_id)?;

        match self.state_machine.plan(&fresh, target, now) {
            Ok(TransitionPlan::Unchanged(item)) => {
                tracing::debug!(state = %item.state, "并发写入已达到目标状态,按幂等处理");
                self.publish_transition(&item, now)?;
                Ok(item)
            }
            Ok(TransitionPlan::Apply(_)) => {
                tracing::warn!(current = %fresh.state, "并发写入冲突");
                Err(KitchenError::StaleTransition {
                    item_id: item_id.to_string(),
                    current: fresh.state,
                    requested: target,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "并发写入后状态推进被拒绝");
                Err(e.into())
            }
        }
    }

    fn load_item(&self, item_id: &str) -> KitchenResult<PreparationItem> {
        self.item_repo
            .find_by_id(item_id)?
            .ok_or_else(|| KitchenError::NotFound(format!("出餐项{}不存在", item_id)))
    }

    fn publish_transition(&self, item: &PreparationItem, now: DateTime<Utc>) -> KitchenResult<()> {
        let progress = self.recompute_progress(&item.order_id)?;
        self.publish_items(
            ChangeKind::Transitioned,
            std::slice::from_ref(item),
            progress,
            now,
        )
    }
}
