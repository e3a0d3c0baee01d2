// ==========================================
// 后厨出餐引擎 - 领域类型定义
// ==========================================
// 红线: 出餐项状态严格单向推进,不可跳转,不可回退
// 红线: 紧急度是"等级制",不是评分制
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 出餐项状态 (Preparation State)
// ==========================================
// 顺序: Pending < InProgress < Ready < Delivered
// 序列化格式: snake_case (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrepState {
    Pending,    // 待制作
    InProgress, // 制作中
    Ready,      // 已出品
    Delivered,  // 已交付(终态)
}

impl PrepState {
    /// 全部状态,按推进顺序排列
    pub const ALL: [PrepState; 4] = [
        PrepState::Pending,
        PrepState::InProgress,
        PrepState::Ready,
        PrepState::Delivered,
    ];

    /// 数据库/序列化字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            PrepState::Pending => "pending",
            PrepState::InProgress => "in_progress",
            PrepState::Ready => "ready",
            PrepState::Delivered => "delivered",
        }
    }

    /// 从数据库字符串解析
    ///
    /// 未知值返回 None,由调用方决定如何报错(状态机不做静默兜底)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(PrepState::Pending),
            "in_progress" => Some(PrepState::InProgress),
            "ready" => Some(PrepState::Ready),
            "delivered" => Some(PrepState::Delivered),
            _ => None,
        }
    }

    /// 下一个合法状态(终态返回 None)
    pub fn next(&self) -> Option<PrepState> {
        match self {
            PrepState::Pending => Some(PrepState::InProgress),
            PrepState::InProgress => Some(PrepState::Ready),
            PrepState::Ready => Some(PrepState::Delivered),
            PrepState::Delivered => None,
        }
    }

    /// 是否终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, PrepState::Delivered)
    }

    /// 是否已出品(ready 或之后),用于进度统计
    pub fn is_ready_or_later(&self) -> bool {
        matches!(self, PrepState::Ready | PrepState::Delivered)
    }
}

impl fmt::Display for PrepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrepState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PrepState::parse(s).ok_or_else(|| format!("未知的出餐项状态: {}", s))
    }
}

// ==========================================
// 紧急度等级 (Urgency Tier)
// ==========================================
// 顺序: Normal < Warning < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    Normal,   // 正常
    Warning,  // 关注
    Critical, // 告急
}

impl fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrgencyTier::Normal => write!(f, "normal"),
            UrgencyTier::Warning => write!(f, "warning"),
            UrgencyTier::Critical => write!(f, "critical"),
        }
    }
}

// ==========================================
// 订单粗粒度状态 (Order Status)
// ==========================================
// 由外部订单系统维护,本引擎只读
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,        // 待接单
    InPrep,         // 制作中
    Ready,          // 待取餐
    OutForDelivery, // 配送中
    Completed,      // 已完成
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InPrep => "in_prep",
            OrderStatus::Ready => "ready",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Completed => "completed",
        }
    }

    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pending" => OrderStatus::Pending,
            "in_prep" => OrderStatus::InPrep,
            "ready" => OrderStatus::Ready,
            "out_for_delivery" => OrderStatus::OutForDelivery,
            "completed" => OrderStatus::Completed,
            _ => OrderStatus::Pending, // 默认值
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
