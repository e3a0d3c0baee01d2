// ==========================================
// 后厨出餐引擎 - API层错误类型
// ==========================================
// 职责: 对外错误分类,把仓储/引擎错误转换为调用方可处理的类别
// 约定:
// - StaleTransition: 看板应静默刷新("别人已经推进了")
// - StoreUnavailable: 唯一允许调用方重试的类别,引擎内部不重试
// - 其余: 作为可操作的提示展示
// ==========================================

use crate::domain::types::PrepState;
use crate::engine::decomposition::DecompositionError;
use crate::engine::events::PublishError;
use crate::engine::state_machine::TransitionError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum KitchenError {
    // ==========================================
    // 订单拆分错误
    // ==========================================
    #[error("订单不合法: {0}")]
    InvalidOrder(String),

    #[error("产品工位关联无法解析: product_id={product_id}, {reason}")]
    UnknownProduct { product_id: String, reason: String },

    // ==========================================
    // 状态推进错误
    // ==========================================
    #[error("出餐项已交付,不可再变更: item_id={item_id}")]
    TerminalState { item_id: String },

    #[error("状态已过期: item_id={item_id}, current={current}, requested={requested}")]
    StaleTransition {
        item_id: String,
        current: PrepState,
        requested: PrepState,
    },

    #[error("不允许的状态跳转: item_id={item_id}, from={from} to={to}")]
    IllegalTransition {
        item_id: String,
        from: PrepState,
        to: PrepState,
    },

    // ==========================================
    // 基础设施错误
    // ==========================================
    #[error("存储不可用: {0}")]
    StoreUnavailable(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),
}

impl KitchenError {
    /// 是否允许调用方重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, KitchenError::StoreUnavailable(_))
    }

    /// 是否为"已被他人推进"类错误(看板静默刷新即可)
    pub fn is_stale(&self) -> bool {
        matches!(self, KitchenError::StaleTransition { .. })
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for KitchenError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                KitchenError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                KitchenError::InvalidInput(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                KitchenError::InvalidInput(format!("外键约束违反: {}", msg))
            }
            RepositoryError::ValidationError(msg) => KitchenError::InvalidInput(msg),
            RepositoryError::FieldValueError { field, message } => {
                KitchenError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            // 状态推进路径会先重读再判定,走到这里说明冲突发生在重读之外
            RepositoryError::OptimisticLockFailure {
                item_id,
                expected,
                actual,
            } => KitchenError::StoreUnavailable(format!(
                "出餐项 {} 并发写入冲突(expected_revision={}, actual_revision={})",
                item_id, expected, actual
            )),
            RepositoryError::InternalError(msg) => KitchenError::StoreUnavailable(msg),
            other => KitchenError::StoreUnavailable(other.to_string()),
        }
    }
}

// ==========================================
// 从引擎错误转换
// ==========================================
impl From<TransitionError> for KitchenError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Terminal { item_id, .. } => KitchenError::TerminalState { item_id },
            TransitionError::Stale {
                item_id,
                current,
                requested,
            } => KitchenError::StaleTransition {
                item_id,
                current,
                requested,
            },
            TransitionError::Skipped { item_id, from, to } => {
                KitchenError::IllegalTransition { item_id, from, to }
            }
        }
    }
}

impl From<DecompositionError> for KitchenError {
    fn from(err: DecompositionError) -> Self {
        match err {
            DecompositionError::InvalidOrder { .. } => KitchenError::InvalidOrder(err.to_string()),
            DecompositionError::UnknownProduct { product_id, reason } => {
                KitchenError::UnknownProduct { product_id, reason }
            }
        }
    }
}

impl From<PublishError> for KitchenError {
    fn from(err: PublishError) -> Self {
        KitchenError::StoreUnavailable(format!("事件通道不可用: {}", err))
    }
}

/// Result 类型别名
pub type KitchenResult<T> = Result<T, KitchenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_mapping() {
        let err: KitchenError = RepositoryError::LockError("poisoned".into()).into();
        assert!(err.is_retryable());

        let err: KitchenError = RepositoryError::NotFound {
            entity: "PreparationItem".into(),
            id: "X".into(),
        }
        .into();
        assert!(matches!(err, KitchenError::NotFound(_)));
        assert!(!err.is_retryable());

        let err: KitchenError = RepositoryError::ForeignKeyViolation("station".into()).into();
        assert!(matches!(err, KitchenError::InvalidInput(_)));
    }

    #[test]
    fn test_transition_mapping() {
        let err: KitchenError = TransitionError::Stale {
            item_id: "I1".into(),
            current: PrepState::Ready,
            requested: PrepState::InProgress,
        }
        .into();
        assert!(err.is_stale());
        assert!(!err.is_retryable());

        let err: KitchenError = TransitionError::Skipped {
            item_id: "I1".into(),
            from: PrepState::Pending,
            to: PrepState::Ready,
        }
        .into();
        assert!(matches!(err, KitchenError::IllegalTransition { .. }));
    }

    #[test]
    fn test_publish_error_is_store_unavailable() {
        let err: KitchenError = PublishError::Closed.into();
        assert!(err.is_retryable());
    }
}
