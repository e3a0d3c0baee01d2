// ==========================================
// 后厨出餐引擎 - 变更事件发布
// ==========================================
// 职责: 定义出餐项变更事件与发布 trait,实现依赖倒置
// 说明: API 层只依赖 ChangeEventPublisher,进程内实现为 realtime::FanoutHub,
//       WebSocket / 消息队列桥接可实现同一 trait
// ==========================================

use crate::domain::prep_item::PreparationItem;
use crate::domain::progress::OrderProgress;
use crate::domain::types::PrepState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

// ==========================================
// 事件类型
// ==========================================

/// 变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// 出餐项创建(订单拆分)
    Created,
    /// 状态推进
    Transitioned,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Transitioned => "transitioned",
        }
    }
}

/// 出餐项变更事件
///
/// 订阅方应把事件当作"重新拉取"的触发信号,而不是唯一的事实来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// 发布序号(由发布者分配,单调递增; 未分配时为 0)
    pub sequence: u64,
    pub kind: ChangeKind,
    pub item_id: String,
    pub order_id: String,
    pub station_id: String,
    pub new_state: PrepState,
    pub revision: i64,
    /// 变更发生后该订单的进度
    pub progress: OrderProgress,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    /// 从出餐项快照构造事件
    pub fn from_item(
        kind: ChangeKind,
        item: &PreparationItem,
        progress: OrderProgress,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sequence: 0,
            kind,
            item_id: item.item_id.clone(),
            order_id: item.order_id.clone(),
            station_id: item.station_id.clone(),
            new_state: item.state,
            revision: item.revision,
            progress,
            occurred_at,
        }
    }
}

// ==========================================
// 发布结果
// ==========================================

/// 发布回执
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishReceipt {
    /// 分配的序号; 被去重丢弃时为 None
    pub sequence: Option<u64>,
    /// 投递到的订阅数
    pub delivered: usize,
}

/// 发布失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("事件通道已关闭")]
    Closed,

    #[error("事件发布失败: {0}")]
    Transport(String),
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 出餐项变更事件发布者
///
/// # 约定
/// - 同一出餐项的事件按 revision 单调递增投递
/// - 实现方不得在持有锁期间做存储 I/O
pub trait ChangeEventPublisher: Send + Sync {
    fn publish(&self, event: ChangeEvent) -> Result<PublishReceipt, PublishError>;
}

/// 空操作事件发布者
///
/// 用于不需要事件发布的场景(如单元测试、一次性 CLI 命令)
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl ChangeEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: ChangeEvent) -> Result<PublishReceipt, PublishError> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - item_id={}, kind={}",
            event.item_id,
            event.kind.as_str()
        );
        Ok(PublishReceipt::default())
    }
}

impl<T: ChangeEventPublisher + ?Sized> ChangeEventPublisher for Arc<T> {
    fn publish(&self, event: ChangeEvent) -> Result<PublishReceipt, PublishError> {
        (**self).publish(event)
    }
}
