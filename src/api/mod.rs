// ==========================================
// 后厨出餐引擎 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供命令行/看板服务调用
// ==========================================

pub mod error;
pub mod kitchen_api;

// 重导出核心类型
pub use error::{KitchenError, KitchenResult};
pub use kitchen_api::{KitchenApi, UrgencyTarget};
