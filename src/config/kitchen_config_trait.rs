// ==========================================
// 后厨出餐引擎 - 配置读取 Trait
// ==========================================
// 职责: 定义应用启动所需的配置读取接口(不包含实现)
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::engine::urgency::UrgencyPolicy;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// KitchenConfigReader Trait
// ==========================================
// 用途: 应用启动时装配紧急度时钟与分发中心
// 实现者: ConfigManager(从 config_kv 表读取)
#[async_trait]
pub trait KitchenConfigReader: Send + Sync {
    // ===== 紧急度阈值 =====

    /// 获取 warning 阈值(分钟)
    ///
    /// # 默认值
    /// - 8
    async fn get_urgency_warning_minutes(&self) -> Result<i64, Box<dyn Error + Send + Sync>>;

    /// 获取 critical 阈值(分钟)
    ///
    /// # 默认值
    /// - 12
    async fn get_urgency_critical_minutes(&self) -> Result<i64, Box<dyn Error + Send + Sync>>;

    /// 获取紧急度策略(两个阈值组合校验后的结果)
    ///
    /// 非法组合回退默认策略
    async fn get_urgency_policy(&self) -> Result<UrgencyPolicy, Box<dyn Error + Send + Sync>> {
        let warning = self.get_urgency_warning_minutes().await?;
        let critical = self.get_urgency_critical_minutes().await?;
        Ok(UrgencyPolicy::or_default(warning, critical))
    }

    // ===== 实时分发 =====

    /// 获取分发历史缓冲容量
    ///
    /// # 默认值
    /// - 256
    async fn get_fanout_history_capacity(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;
}
