// ==========================================
// 后厨出餐引擎 - 配置层
// ==========================================
// 职责: 系统配置管理(全局一套,不做按出餐项配置)
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod kitchen_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use kitchen_config_trait::KitchenConfigReader;
