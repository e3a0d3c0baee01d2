// ==========================================
// 后厨出餐引擎 - 实时分发 (Fan-out)
// ==========================================
// 红线: 同一出餐项的事件对任一订阅方严格按 revision 递增投递
// 红线: 注册表锁只在入队期间持有,不跨越存储 I/O
// 红线: 订阅只由持有方关闭,引擎不做空闲超时
// ==========================================
// 职责: 把出餐项变更事件分发给三类订阅方
//   - Station(station_id): 单工位看板
//   - AllStations: 跨工位总看板
//   - Order(order_id): 订单进度看板
// 说明: 每个订阅一个无界 mpsc 通道,慢订阅不阻塞写入方
// ==========================================

use crate::domain::types::PrepState;
use crate::engine::events::{ChangeEvent, ChangeEventPublisher, PublishError, PublishReceipt};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// 默认历史缓冲容量
pub const DEFAULT_HISTORY_CAPACITY: usize = 256;

// ==========================================
// 订阅范围
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum SubscriptionScope {
    Station(String),
    AllStations,
    Order(String),
}

impl SubscriptionScope {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            SubscriptionScope::Station(station_id) => event.station_id == *station_id,
            SubscriptionScope::AllStations => true,
            SubscriptionScope::Order(order_id) => event.order_id == *order_id,
        }
    }
}

// ==========================================
// 内部状态
// ==========================================
struct Subscriber {
    scope: SubscriptionScope,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

#[derive(Default)]
struct HubState {
    subscribers: HashMap<u64, Subscriber>,
    last_revision: HashMap<String, i64>,
    delivered_items: VecDeque<String>, // 已交付出餐项,按交付顺序淘汰 last_revision
    history: VecDeque<ChangeEvent>,
    last_sequence: u64,
    closed: bool,
}

struct HubInner {
    state: Mutex<HubState>,
    next_subscription_id: AtomicU64,
    history_capacity: usize,
}

impl HubInner {
    fn lock(&self) -> Result<MutexGuard<'_, HubState>, PublishError> {
        self.state
            .lock()
            .map_err(|e| PublishError::Transport(format!("fan-out 注册表锁失败: {}", e)))
    }

    fn unregister(&self, id: u64) {
        if let Ok(mut state) = self.state.lock() {
            if state.subscribers.remove(&id).is_some() {
                tracing::debug!(subscription_id = id, "订阅已注销");
            }
        }
    }
}

// ==========================================
// FanoutHub - 进程内事件分发中心
// ==========================================
#[derive(Clone)]
pub struct FanoutHub {
    inner: Arc<HubInner>,
}

impl Default for FanoutHub {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl std::fmt::Debug for FanoutHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutHub")
            .field("history_capacity", &self.inner.history_capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl FanoutHub {
    /// 创建分发中心
    ///
    /// # 参数
    /// - history_capacity: 历史缓冲容量(供迟到订阅方补齐),最小为 1
    pub fn new(history_capacity: usize) -> Self {
        let history_capacity = history_capacity.max(1);
        Self {
            inner: Arc::new(HubInner {
                state: Mutex::new(HubState {
                    history: VecDeque::with_capacity(history_capacity),
                    ..HubState::default()
                }),
                next_subscription_id: AtomicU64::new(1),
                history_capacity,
            }),
        }
    }

    /// 订阅
    pub fn subscribe(&self, scope: SubscriptionScope) -> Result<Subscription, PublishError> {
        self.register(scope, None)
    }

    /// 订阅并补发 sequence 之后的历史事件
    ///
    /// 补发与注册在同一把锁内完成,补发与实时事件之间不会重复也不会遗漏
    /// (超出历史容量的部分除外,订阅方应全量重拉)
    pub fn subscribe_since(
        &self,
        scope: SubscriptionScope,
        sequence: u64,
    ) -> Result<Subscription, PublishError> {
        self.register(scope, Some(sequence))
    }

    fn register(
        &self,
        scope: SubscriptionScope,
        replay_after: Option<u64>,
    ) -> Result<Subscription, PublishError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_subscription_id.fetch_add(1, Ordering::Relaxed);

        let mut state = self.inner.lock()?;
        if state.closed {
            return Err(PublishError::Closed);
        }

        let mut replayed = 0usize;
        if let Some(after) = replay_after {
            for event in state
                .history
                .iter()
                .filter(|e| e.sequence > after && scope.matches(e))
            {
                // rx 仍在本函数内,发送不会失败
                let _ = tx.send(event.clone());
                replayed += 1;
            }
        }

        state.subscribers.insert(
            id,
            Subscriber {
                scope: scope.clone(),
                tx,
            },
        );
        drop(state);

        tracing::debug!(subscription_id = id, ?scope, replayed, "新增订阅");

        Ok(Subscription {
            id,
            scope,
            rx,
            hub: Arc::downgrade(&self.inner),
            closed: false,
        })
    }

    /// 当前订阅数
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .map(|s| s.subscribers.len())
            .unwrap_or(0)
    }

    /// 最近分配的序号
    pub fn last_sequence(&self) -> u64 {
        self.inner
            .state
            .lock()
            .map(|s| s.last_sequence)
            .unwrap_or(0)
    }

    /// 当前跟踪 revision 的出餐项数
    pub fn tracked_item_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .map(|s| s.last_revision.len())
            .unwrap_or(0)
    }

    /// 查询 sequence 之后的历史事件
    pub fn history_since(&self, sequence: u64) -> Vec<ChangeEvent> {
        self.inner
            .state
            .lock()
            .map(|s| {
                s.history
                    .iter()
                    .filter(|e| e.sequence > sequence)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 关闭分发中心
    ///
    /// 所有订阅在取完已入队事件后结束; 之后的发布/订阅返回 Closed
    pub fn shutdown(&self) {
        if let Ok(mut state) = self.inner.state.lock() {
            state.closed = true;
            let count = state.subscribers.len();
            state.subscribers.clear();
            tracing::info!(subscriptions = count, "fan-out 已关闭");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().map(|s| s.closed).unwrap_or(true)
    }
}

impl ChangeEventPublisher for FanoutHub {
    /// 发布事件
    ///
    /// 同一出餐项 revision 不大于已发布值的事件直接丢弃(重放或乱序到达)
    fn publish(&self, mut event: ChangeEvent) -> Result<PublishReceipt, PublishError> {
        let mut state = self.inner.lock()?;
        if state.closed {
            return Err(PublishError::Closed);
        }

        if let Some(last) = state.last_revision.get(&event.item_id) {
            if event.revision <= *last {
                tracing::debug!(
                    item_id = %event.item_id,
                    revision = event.revision,
                    last_revision = *last,
                    "丢弃过期/重复事件"
                );
                return Ok(PublishReceipt::default());
            }
        }

        state.last_sequence += 1;
        event.sequence = state.last_sequence;
        state
            .last_revision
            .insert(event.item_id.clone(), event.revision);

        // delivered 之后不会再有新 revision,保留最近 history_capacity 个用于拦截迟到事件
        if event.new_state == PrepState::Delivered {
            state.delivered_items.push_back(event.item_id.clone());
            while state.delivered_items.len() > self.inner.history_capacity {
                if let Some(evicted) = state.delivered_items.pop_front() {
                    state.last_revision.remove(&evicted);
                }
            }
        }

        if state.history.len() == self.inner.history_capacity {
            state.history.pop_front();
        }
        state.history.push_back(event.clone());

        let mut delivered = 0usize;
        let mut gone = Vec::new();
        for (id, sub) in state.subscribers.iter() {
            if !sub.scope.matches(&event) {
                continue;
            }
            if sub.tx.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                gone.push(*id);
            }
        }
        for id in gone {
            state.subscribers.remove(&id);
        }

        tracing::debug!(
            sequence = event.sequence,
            item_id = %event.item_id,
            new_state = %event.new_state,
            delivered,
            "事件已分发"
        );

        Ok(PublishReceipt {
            sequence: Some(event.sequence),
            delivered,
        })
    }
}

// ==========================================
// Subscription - 订阅句柄
// ==========================================
pub struct Subscription {
    id: u64,
    scope: SubscriptionScope,
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
    hub: Weak<HubInner>,
    closed: bool,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn scope(&self) -> &SubscriptionScope {
        &self.scope
    }

    /// 等待下一个事件; 订阅关闭且缓冲取完后返回 None
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// 非阻塞取一个事件
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    /// 关闭订阅
    ///
    /// 关闭后不再接收新事件,已入队的事件仍可取出
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(hub) = self.hub.upgrade() {
            hub.unregister(self.id);
        }
        self.rx.close();
    }
}

impl Stream for Subscription {
    type Item = ChangeEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::progress::OrderProgress;
    use crate::engine::events::ChangeKind;
    use chrono::Utc;
    use futures::StreamExt;

    fn event(item: &str, order: &str, station: &str, state: PrepState, revision: i64) -> ChangeEvent {
        ChangeEvent {
            sequence: 0,
            kind: if revision == 0 {
                ChangeKind::Created
            } else {
                ChangeKind::Transitioned
            },
            item_id: item.to_string(),
            order_id: order.to_string(),
            station_id: station.to_string(),
            new_state: state,
            revision,
            progress: OrderProgress::default(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn test_scope_filtering() {
        let hub = FanoutHub::default();
        let mut grill = hub.subscribe(SubscriptionScope::Station("GRILL".into())).unwrap();
        let mut all = hub.subscribe(SubscriptionScope::AllStations).unwrap();
        let mut order = hub.subscribe(SubscriptionScope::Order("102".into())).unwrap();

        hub.publish(event("I1", "101", "GRILL", PrepState::Pending, 0)).unwrap();
        hub.publish(event("I2", "102", "PLATING", PrepState::Pending, 0)).unwrap();

        assert_eq!(grill.try_recv().map(|e| e.item_id), Some("I1".to_string()));
        assert!(grill.try_recv().is_none());
        assert_eq!(order.try_recv().map(|e| e.item_id), Some("I2".to_string()));
        assert!(order.try_recv().is_none());
        assert!(all.try_recv().is_some());
        assert!(all.try_recv().is_some());
    }

    #[test]
    fn test_stale_and_duplicate_revisions_are_dropped() {
        let hub = FanoutHub::default();
        let mut sub = hub.subscribe(SubscriptionScope::AllStations).unwrap();

        hub.publish(event("I1", "101", "GRILL", PrepState::Pending, 0)).unwrap();
        hub.publish(event("I1", "101", "GRILL", PrepState::Ready, 2)).unwrap();
        // 迟到的 revision 1 与重复的 revision 2
        let late = hub.publish(event("I1", "101", "GRILL", PrepState::InProgress, 1)).unwrap();
        let dup = hub.publish(event("I1", "101", "GRILL", PrepState::Ready, 2)).unwrap();
        assert!(late.sequence.is_none());
        assert!(dup.sequence.is_none());

        let states: Vec<_> = std::iter::from_fn(|| sub.try_recv()).map(|e| e.new_state).collect();
        assert_eq!(states, vec![PrepState::Pending, PrepState::Ready]);
    }

    #[test]
    fn test_sequence_is_monotonic() {
        let hub = FanoutHub::default();
        let a = hub.publish(event("I1", "101", "GRILL", PrepState::Pending, 0)).unwrap();
        let b = hub.publish(event("I2", "101", "GRILL", PrepState::Pending, 0)).unwrap();
        assert_eq!(a.sequence, Some(1));
        assert_eq!(b.sequence, Some(2));
        assert_eq!(hub.last_sequence(), 2);
    }

    #[test]
    fn test_subscribe_since_replays_history() {
        let hub = FanoutHub::new(2);
        hub.publish(event("I1", "101", "GRILL", PrepState::Pending, 0)).unwrap();
        hub.publish(event("I2", "101", "PLATING", PrepState::Pending, 0)).unwrap();
        hub.publish(event("I3", "101", "GRILL", PrepState::Pending, 0)).unwrap();

        // 容量 2: 只剩 I2, I3
        assert_eq!(hub.history_since(0).len(), 2);

        let mut sub = hub
            .subscribe_since(SubscriptionScope::Station("GRILL".into()), 1)
            .unwrap();
        assert_eq!(sub.try_recv().map(|e| e.item_id), Some("I3".to_string()));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_close_and_drop_unregister() {
        let hub = FanoutHub::default();
        let mut a = hub.subscribe(SubscriptionScope::AllStations).unwrap();
        let b = hub.subscribe(SubscriptionScope::AllStations).unwrap();
        assert_eq!(hub.subscriber_count(), 2);

        a.close();
        assert_eq!(hub.subscriber_count(), 1);
        drop(b);
        assert_eq!(hub.subscriber_count(), 0);

        let receipt = hub.publish(event("I1", "101", "GRILL", PrepState::Pending, 0)).unwrap();
        assert_eq!(receipt.delivered, 0);
    }

    #[test]
    fn test_shutdown_rejects_publish_and_subscribe() {
        let hub = FanoutHub::default();
        let _sub = hub.subscribe(SubscriptionScope::AllStations).unwrap();
        hub.shutdown();

        assert!(hub.is_closed());
        assert_eq!(
            hub.publish(event("I1", "101", "GRILL", PrepState::Pending, 0)),
            Err(PublishError::Closed)
        );
        assert!(hub.subscribe(SubscriptionScope::AllStations).is_err());
    }

    #[tokio::test]
    async fn test_stream_ends_after_shutdown() {
        let hub = FanoutHub::default();
        let mut sub = hub.subscribe(SubscriptionScope::AllStations).unwrap();
        hub.publish(event("I1", "101", "GRILL", PrepState::Pending, 0)).unwrap();
        hub.shutdown();

        assert_eq!(sub.next().await.map(|e| e.item_id), Some("I1".to_string()));
        assert!(sub.next().await.is_none());
    }

    #[test]
    fn test_delivered_items_stop_being_tracked() {
        let hub = FanoutHub::new(4);
        for i in 0..10_000 {
            let id = format!("I{}", i);
            hub.publish(event(&id, "101", "GRILL", PrepState::Pending, 0)).unwrap();
            hub.publish(event(&id, "101", "GRILL", PrepState::Delivered, 3)).unwrap();
        }
        assert_eq!(hub.history_since(0).len(), 4);
        assert_eq!(hub.tracked_item_count(), 4);
    }

    #[test]
    fn test_active_items_stay_tracked() {
        let hub = FanoutHub::new(2);
        hub.publish(event("ACTIVE", "101", "GRILL", PrepState::InProgress, 1)).unwrap();
        for i in 0..10 {
            let id = format!("D{}", i);
            hub.publish(event(&id, "101", "GRILL", PrepState::Delivered, 3)).unwrap();
        }
        assert_eq!(hub.tracked_item_count(), 3);

        // 未交付的出餐项仍拦截迟到事件
        let late = hub.publish(event("ACTIVE", "101", "GRILL", PrepState::Pending, 0)).unwrap();
        assert!(late.sequence.is_none());
        // 最近交付的出餐项仍拦截迟到事件
        let late = hub.publish(event("D9", "101", "GRILL", PrepState::Ready, 2)).unwrap();
        assert!(late.sequence.is_none());
    }
}
