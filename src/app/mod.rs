// ==========================================
// 后厨出餐引擎 - 应用层
// ==========================================
// 职责: 装配仓储、引擎与 API,供 CLI 与外部传输层使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
