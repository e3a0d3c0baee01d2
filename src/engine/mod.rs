// ==========================================
// 后厨出餐引擎 - 引擎层
// ==========================================
// 职责: 实现业务规则(状态机、拆分、进度、紧急度、分发、看板投影),不拼 SQL
// 红线: Engine 不拼 SQL; 紧急度判定必须输出 reason
// ==========================================

pub mod decomposition;
pub mod events;
pub mod progress;
pub mod realtime;
pub mod state_machine;
pub mod station_registry;
pub mod urgency;
pub mod views;

// 重导出核心引擎
pub use decomposition::{DecompositionError, LookupError, OrderDecomposer, StationAssignmentLookup};
pub use events::{
    ChangeEvent, ChangeEventPublisher, ChangeKind, NoOpEventPublisher, PublishError,
    PublishReceipt,
};
pub use progress::ProgressAggregator;
pub use realtime::{FanoutHub, Subscription, SubscriptionScope};
pub use state_machine::{ItemStateMachine, TransitionError, TransitionPlan};
pub use station_registry::StationRegistry;
pub use urgency::{UrgencyAssessment, UrgencyClock, UrgencyPolicy};
pub use views::{DisplayProjector, OrderView, StationQueue};
