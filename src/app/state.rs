// ==========================================
// 后厨出餐引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::KitchenApi;
use crate::config::{ConfigManager, KitchenConfigReader};
use crate::db::{ensure_schema, open_shared_connection};
use crate::engine::{FanoutHub, StationRegistry, UrgencyClock};
use crate::importer::{AssignmentCsvImporter, StationCsvImporter};
use crate::repository::{
    AssignmentRepository, OrderRepository, PrepItemRepository, StationRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 共享连接(所有仓储共用)
    pub conn: Arc<Mutex<Connection>>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 进程内事件分发中心
    pub hub: FanoutHub,

    /// 后厨API
    pub kitchen_api: Arc<KitchenApi>,

    /// 工位导入
    pub station_importer: StationCsvImporter,

    /// 产品-工位关联导入
    pub assignment_importer: AssignmentCsvImporter,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享连接并建表
    /// 2. 读取配置(紧急度阈值、分发历史容量)
    /// 3. 初始化Repository、Engine与API
    pub async fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let conn = open_shared_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        {
            let guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            ensure_schema(&guard).map_err(|e| format!("建表失败: {}", e))?;
        }

        // ==========================================
        // 初始化配置
        // ==========================================
        let config_manager = Arc::new(ConfigManager::from_connection(conn.clone()));
        let policy = config_manager
            .get_urgency_policy()
            .await
            .map_err(|e| format!("读取紧急度配置失败: {}", e))?;
        let history_capacity = config_manager
            .get_fanout_history_capacity()
            .await
            .map_err(|e| format!("读取分发配置失败: {}", e))?;

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let station_repo = Arc::new(StationRepository::new(conn.clone()));
        let assignment_repo = Arc::new(AssignmentRepository::new(conn.clone()));
        let order_repo = Arc::new(OrderRepository::new(conn.clone()));
        let item_repo = Arc::new(PrepItemRepository::new(conn.clone()));

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let station_registry = Arc::new(StationRegistry::new(station_repo.clone()));
        let hub = FanoutHub::new(history_capacity);
        let clock = UrgencyClock::new(policy);

        // ==========================================
        // 创建API实例
        // ==========================================
        let kitchen_api = Arc::new(KitchenApi::new(
            station_registry,
            assignment_repo.clone(),
            order_repo,
            item_repo,
            hub.clone(),
            clock,
        ));

        tracing::info!(
            warning_minutes = policy.warning_minutes,
            critical_minutes = policy.critical_minutes,
            history_capacity,
            "AppState初始化完成"
        );

        Ok(Self {
            db_path,
            conn,
            config_manager,
            hub,
            kitchen_api,
            station_importer: StationCsvImporter::new(station_repo),
            assignment_importer: AssignmentCsvImporter::new(assignment_repo),
        })
    }

    /// 关闭事件分发(进程退出前调用)
    pub fn shutdown(&self) {
        self.hub.shutdown();
    }
}

/// 获取默认数据库路径
///
/// 优先级: KITCHEN_DB_PATH > 用户数据目录 > ./kitchen_fulfillment.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("KITCHEN_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./kitchen_fulfillment.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        let dir = data_dir.join("kitchen-fulfillment-dev");

        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("kitchen-fulfillment");

        // 目录创建失败时保留当前目录回退值
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("kitchen_fulfillment.db");
        }
    }

    path.to_string_lossy().to_string()
}
