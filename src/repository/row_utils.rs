// ==========================================
// 后厨出餐引擎 - 行映射公共工具
// ==========================================
// 时间统一以 RFC 3339 (UTC) 文本存储
// ==========================================

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::Row;

/// DateTime<Utc> 转数据库文本
pub fn ts_to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 截断到存储精度(毫秒),写入前后的快照保持一致
pub fn to_db_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(3)
}

/// 可空时间转数据库文本
pub fn opt_ts_to_db(ts: &Option<DateTime<Utc>>) -> Option<String> {
    ts.as_ref().map(ts_to_db)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// 读取非空时间列
pub fn get_ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

/// 读取可空时间列
pub fn get_opt_ts(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => parse_ts(idx, &raw).map(Some),
        None => Ok(None),
    }
}

/// 构造 IN (?, ?, ...) 占位符
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
