// ==========================================
// 后厨出餐引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod order;
pub mod prep_item;
pub mod progress;
pub mod station;
pub mod types;

// 重导出核心类型
pub use order::{Order, OrderLine};
pub use prep_item::PreparationItem;
pub use progress::OrderProgress;
pub use station::{Station, StationAssignment};
pub use types::{OrderStatus, PrepState, UrgencyTier};
