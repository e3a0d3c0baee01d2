// ==========================================
// 后厨出餐引擎 - 工位领域模型
// ==========================================
// 说明: 工位在一个班次内不可变,仅由(范围外的)后台管理修改
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// Station - 制作工位
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub station_id: String, // 工位ID
    pub name: String,       // 工位名称 (如 Grill / Plating)
    pub display_order: i32, // 展示顺序
    pub color: String,      // 看板颜色 (#RRGGBB)
    pub active: bool,       // 是否启用
}

// ==========================================
// StationAssignment - 产品-工位关联
// ==========================================
// 用途: 订单拆分时决定一个订单行要路由到哪些工位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationAssignment {
    pub product_id: String,
    pub station_id: String,
    pub estimated_minutes: i32, // 每批次预计时长(不按份数放大)
    pub complexity: i32,        // 制作复杂度 (1-5)
}
