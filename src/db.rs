// ==========================================
// 后厨出餐引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout,多个工位进程并发写入时等待而不是直接报 busy
// - 建表幂等,schema_version 记录当前版本
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认 busy_timeout(毫秒)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 建表语句
///
/// 说明:
/// - prep_item 的 UNIQUE(order_line_id, station_id) 是拆分幂等的存储层兜底
/// - revision 用于单行 compare-and-set
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS station (
    station_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    display_order INTEGER NOT NULL DEFAULT 0,
    color TEXT NOT NULL DEFAULT '#888888',
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS product_station (
    product_id TEXT NOT NULL,
    station_id TEXT NOT NULL REFERENCES station(station_id),
    estimated_minutes INTEGER NOT NULL DEFAULT 0,
    complexity INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (product_id, station_id)
);

CREATE TABLE IF NOT EXISTS kitchen_order (
    order_id TEXT PRIMARY KEY,
    placed_at TEXT NOT NULL,
    customer_name TEXT,
    delivery_address TEXT,
    promised_minutes INTEGER,
    order_status TEXT NOT NULL DEFAULT 'pending',
    priority INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS order_line (
    order_line_id TEXT PRIMARY KEY,
    order_id TEXT NOT NULL REFERENCES kitchen_order(order_id),
    product_id TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    notes TEXT
);

CREATE INDEX IF NOT EXISTS idx_order_line_order ON order_line(order_id);

CREATE TABLE IF NOT EXISTS prep_item (
    item_id TEXT PRIMARY KEY,
    order_id TEXT NOT NULL REFERENCES kitchen_order(order_id),
    order_line_id TEXT NOT NULL REFERENCES order_line(order_line_id),
    station_id TEXT NOT NULL REFERENCES station(station_id),
    quantity INTEGER NOT NULL,
    state TEXT NOT NULL DEFAULT 'pending',
    priority INTEGER NOT NULL DEFAULT 0,
    notes TEXT,
    estimated_minutes INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    started_at TEXT,
    finished_at TEXT,
    revision INTEGER NOT NULL DEFAULT 0,
    UNIQUE (order_line_id, station_id)
);

CREATE INDEX IF NOT EXISTS idx_prep_item_order ON prep_item(order_id);
CREATE INDEX IF NOT EXISTS idx_prep_item_station_state ON prep_item(station_id, state);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明:
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    crate::perf::install_sqlite_tracing(&mut conn);
    Ok(conn)
}

/// 打开供多个仓储共享的连接
pub fn open_shared_connection(db_path: &str) -> rusqlite::Result<Arc<Mutex<Connection>>> {
    Ok(Arc::new(Mutex::new(open_sqlite_connection(db_path)?)))
}

/// 建表(幂等)并登记 schema_version
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    if let Some(v) = read_schema_version(conn)? {
        if v > CURRENT_SCHEMA_VERSION {
            tracing::warn!(
                "数据库 schema_version={} 高于代码期望的 {},请确认程序版本",
                v,
                CURRENT_SCHEMA_VERSION
            );
        }
    }
    Ok(())
}

/// 读取 schema_version(若表不存在则返回 None)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
