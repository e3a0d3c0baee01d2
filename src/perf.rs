// ==========================================
// 后厨出餐引擎 - SQL 性能观测
// ==========================================
// 职责: 慢 SQL 日志(工位并发写入时定位锁等待)
// ==========================================

use rusqlite::Connection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static SLOW_SQL_THRESHOLD_MS: AtomicU64 = AtomicU64::new(u64::MAX);

fn is_true(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

fn truncate_sql(sql: &str, max_len: usize) -> String {
    let s = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if s.chars().count() <= max_len {
        return s;
    }
    let head: String = s.chars().take(max_len).collect();
    format!("{}…", head)
}

/// 安装 SQLite 语句 profile(慢查询日志)
///
/// 开关:
/// - Debug 默认开启; Release 默认关闭
/// - `KITCHEN_PERF_SQL=1` 强制开启
/// - `KITCHEN_SLOW_SQL_MS=50` 配置慢 SQL 阈值(毫秒)
pub fn install_sqlite_tracing(conn: &mut Connection) {
    let enabled = match std::env::var("KITCHEN_PERF_SQL") {
        Ok(v) => is_true(&v),
        Err(_) => cfg!(debug_assertions),
    };

    if !enabled {
        conn.profile(None);
        return;
    }

    let slow_ms = std::env::var("KITCHEN_SLOW_SQL_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
    SLOW_SQL_THRESHOLD_MS.store(slow_ms, Ordering::Relaxed);

    conn.profile(Some(sql_profile_callback));
}

fn sql_profile_callback(sql: &str, elapsed: Duration) {
    let threshold = SLOW_SQL_THRESHOLD_MS.load(Ordering::Relaxed);
    if elapsed.as_millis() as u64 >= threshold {
        tracing::warn!(
            target: "kitchen_fulfillment::perf",
            elapsed_ms = elapsed.as_millis() as u64,
            sql = %truncate_sql(sql, 200),
            "慢 SQL"
        );
    }
}
