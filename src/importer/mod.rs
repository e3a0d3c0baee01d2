// ==========================================
// 后厨出餐引擎 - 数据导入模块
// ==========================================
// 职责: 从 CSV 初始化工位与产品-工位关联
// 说明: 订单由外部接单系统写入,不在导入范围内
// ==========================================

pub mod csv_importer;
pub mod error;

// 重导出
pub use csv_importer::{AssignmentCsvImporter, ImportSummary, StationCsvImporter};
pub use error::{ImportError, ImportResult};
