// ==========================================
// 后厨出餐引擎 - 订单领域模型
// ==========================================
// 红线: 订单由外部系统维护,本引擎只读
// ==========================================

use crate::domain::types::OrderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Order - 已接单的订单
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub placed_at: DateTime<Utc>,             // 下单时间
    pub customer_name: Option<String>,        // 顾客
    pub delivery_address: Option<String>,     // 配送地址
    pub promised_minutes: Option<i32>,        // 承诺出餐时长
    pub order_status: OrderStatus,            // 粗粒度生命周期(外部驱动)
    pub priority: i32,                        // 出餐优先级,拆分时复制到每个出餐项
    #[serde(default)]
    pub lines: Vec<OrderLine>,                // 订单行
}

impl Order {
    /// 是否存在订单行
    pub fn has_lines(&self) -> bool {
        !self.lines.is_empty()
    }
}

// ==========================================
// OrderLine - 订单行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_line_id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i32,
    pub notes: Option<String>, // 备注(如"不要香菜"),原样带入出餐项
}
