// ==========================================
// 后厨出餐引擎 - 后厨 API
// ==========================================
// 职责: 编排仓储与引擎,对外提供
//   - 订单拆分 / 状态推进 / 进度 / 紧急度
//   - 订阅变更事件
//   - 工位队列 / 订单看板
// 红线: 不在持有任何进程内锁期间做存储 I/O 或发布
// 红线: 业务规则错误(终态/过期/跳转)原样返回,不做静默修复
// ==========================================

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::api::error::{KitchenError, KitchenResult};
use crate::domain::prep_item::PreparationItem;
use crate::domain::progress::OrderProgress;
use crate::engine::decomposition::OrderDecomposer;
use crate::engine::events::{ChangeEvent, ChangeEventPublisher, ChangeKind};
use crate::engine::progress::ProgressAggregator;
use crate::engine::realtime::{FanoutHub, Subscription, SubscriptionScope};
use crate::engine::state_machine::ItemStateMachine;
use crate::engine::station_registry::StationRegistry;
use crate::engine::urgency::UrgencyClock;
use crate::engine::views::DisplayProjector;
use crate::repository::{AssignmentRepository, OrderRepository, PrepItemRepository};

mod items;
mod orders;
mod stations;


pub use orders::UrgencyTarget;

// ==========================================
// KitchenApi - 后厨 API
// ==========================================
pub struct KitchenApi {
    station_registry: Arc<StationRegistry>,
    assignment_repo: Arc<AssignmentRepository>,
    order_repo: Arc<OrderRepository>,
    item_repo: Arc<PrepItemRepository>,
    hub: FanoutHub,
    // 默认指向 hub; 可替换为外部传输桥接
    publisher: Arc<dyn ChangeEventPublisher>,
    decomposer: OrderDecomposer,
    state_machine: ItemStateMachine,
    aggregator: ProgressAggregator,
    clock: UrgencyClock,
    projector: DisplayProjector,
}

impl KitchenApi {
    /// 创建新的KitchenApi实例
    pub fn new(
        station_registry: Arc<StationRegistry>,
        assignment_repo: Arc<AssignmentRepository>,
        order_repo: Arc<OrderRepository>,
        item_repo: Arc<PrepItemRepository>,
        hub: FanoutHub,
        clock: UrgencyClock,
    ) -> Self {
        let publisher: Arc<dyn ChangeEventPublisher> = Arc::new(hub.clone());
        Self {
            station_registry,
            assignment_repo,
            order_repo,
            item_repo,
            hub,
            publisher,
            decomposer: OrderDecomposer::new(),
            state_machine: ItemStateMachine::new(),
            aggregator: ProgressAggregator::new(),
            clock,
            projector: DisplayProjector::new(clock),
        }
    }

    /// 替换事件发布者
    ///
    /// 替换后 subscribe 仍挂在进程内 hub 上,外部发布者负责自己的投递
    pub fn with_publisher(mut self, publisher: Arc<dyn ChangeEventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn hub(&self) -> &FanoutHub {
        &self.hub
    }

    pub fn urgency_clock(&self) -> UrgencyClock {
        self.clock
    }

    // ==========================================
    // 订阅接口
    // ==========================================

    /// 订阅变更事件
    ///
    /// 事件只是"重新拉取"的触发信号; 订阅由调用方 close/drop 结束
    pub fn subscribe(&self, scope: SubscriptionScope) -> KitchenResult<Subscription> {
        self.validate_scope(&scope)?;
        Ok(self.hub.subscribe(scope)?)
    }

    /// 订阅并补发 sequence 之后仍在历史缓冲中的事件
    pub fn subscribe_since(
        &self,
        scope: SubscriptionScope,
        sequence: u64,
    ) -> KitchenResult<Subscription> {
        self.validate_scope(&scope)?;
        Ok(self.hub.subscribe_since(scope, sequence)?)
    }

    fn validate_scope(&self, scope: &SubscriptionScope) -> KitchenResult<()> {
        match scope {
            SubscriptionScope::Station(id) | SubscriptionScope::Order(id) if id.trim().is_empty() => {
                Err(KitchenError::InvalidInput("订阅范围ID不能为空".to_string()))
            }
            _ => Ok(()),
        }
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 从全集重新计算订单进度
    fn recompute_progress(&self, order_id: &str) -> KitchenResult<OrderProgress> {
        let items = self.item_repo.find_by_order(order_id)?;
        Ok(self.aggregator.compute(&items))
    }

    /// 发布一批同一订单的出餐项事件
    ///
    /// 存储已提交后的发布失败按 StoreUnavailable 返回; 调用方重试时
    /// 重放路径会重新发布,hub 按 revision 去重
    fn publish_items(
        &self,
        kind: ChangeKind,
        items: &[PreparationItem],
        progress: OrderProgress,
        now: DateTime<Utc>,
    ) -> KitchenResult<()> {
        for item in items {
            let event = ChangeEvent::from_item(kind, item, progress, now);
            if let Err(e) = self.publisher.publish(event) {
                tracing::error!(item_id = %item.item_id, error = %e, "事件发布失败");
                return Err(e.into());
            }
        }
        Ok(())
    }
}
