// ==========================================
// 后厨出餐引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope),只使用 global scope
// ==========================================

use crate::config::kitchen_config_trait::KitchenConfigReader;
use crate::db::open_sqlite_connection;
use crate::engine::realtime::DEFAULT_HISTORY_CAPACITY;
use crate::engine::urgency::{DEFAULT_CRITICAL_MINUTES, DEFAULT_WARNING_MINUTES};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值(scope_id='global')
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global 配置(UPSERT)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        tracing::info!(config_key = key, value, "配置已更新");
        Ok(())
    }

    /// 读取配置值,带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 读取整数配置; 无法解析时告警并使用默认值
    fn get_i64_or_default(&self, key: &str, default: i64) -> ConfigResult<i64> {
        let raw = self.get_config_or_default(key, &default.to_string())?;
        Ok(raw.trim().parse::<i64>().unwrap_or_else(|_| {
            tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误,使用默认值 {}", default);
            default
        }))
    }

    /// 获取所有 global 配置的快照(JSON格式,按键排序)
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// KitchenConfigReader Trait 实现
// ==========================================
#[async_trait]
impl KitchenConfigReader for ConfigManager {
    // ===== 紧急度阈值 =====

    async fn get_urgency_warning_minutes(&self) -> ConfigResult<i64> {
        self.get_i64_or_default(config_keys::URGENCY_WARNING_MINUTES, DEFAULT_WARNING_MINUTES)
    }

    async fn get_urgency_critical_minutes(&self) -> ConfigResult<i64> {
        self.get_i64_or_default(config_keys::URGENCY_CRITICAL_MINUTES, DEFAULT_CRITICAL_MINUTES)
    }

    // ===== 实时分发 =====

    async fn get_fanout_history_capacity(&self) -> ConfigResult<usize> {
        let value = self.get_i64_or_default(
            config_keys::FANOUT_HISTORY_CAPACITY,
            DEFAULT_HISTORY_CAPACITY as i64,
        )?;
        if value <= 0 {
            tracing::warn!(value, "分发历史容量非法,使用默认值 {}", DEFAULT_HISTORY_CAPACITY);
            return Ok(DEFAULT_HISTORY_CAPACITY);
        }
        Ok(value as usize)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 紧急度阈值(分钟)
    pub const URGENCY_WARNING_MINUTES: &str = "urgency_warning_minutes";
    pub const URGENCY_CRITICAL_MINUTES: &str = "urgency_critical_minutes";

    // 实时分发
    pub const FANOUT_HISTORY_CAPACITY: &str = "fanout_history_capacity";
}
