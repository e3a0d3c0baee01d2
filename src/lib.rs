// ==========================================
// 后厨出餐引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + tokio
// 系统定位: 订单 → 工位出餐项 → 状态推进 → 看板实时刷新
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 工位/关联 CSV
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// SQL 耗时追踪
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{OrderStatus, PrepState, UrgencyTier};

// 领域实体
pub use domain::{Order, OrderLine, OrderProgress, PreparationItem, Station, StationAssignment};

// 引擎
pub use engine::{
    ChangeEvent, ChangeEventPublisher, ChangeKind, DisplayProjector, FanoutHub, ItemStateMachine,
    OrderDecomposer, OrderView, ProgressAggregator, StationQueue, Subscription, SubscriptionScope,
    UrgencyAssessment, UrgencyClock, UrgencyPolicy,
};

// API
pub use api::{KitchenApi, KitchenError, KitchenResult, UrgencyTarget};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "后厨出餐引擎";
