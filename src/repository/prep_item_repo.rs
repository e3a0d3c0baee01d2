// ==========================================
// 后厨出餐引擎 - 出餐项仓储
// ==========================================
// 红线: Repository 不含业务逻辑(状态推进规则在 engine::state_machine)
// 红线: 出餐项只允许单行 compare-and-set 更新,禁止批量改状态
// 红线: 不提供删除
// ==========================================

use crate::domain::prep_item::PreparationItem;
use crate::domain::types::PrepState;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{get_opt_ts, get_ts, opt_ts_to_db, ts_to_db};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::sync::{Arc, Mutex};

const ITEM_COLUMNS: &str = "item_id, order_id, order_line_id, station_id, quantity, state, \
                            priority, notes, estimated_minutes, created_at, started_at, \
                            finished_at, revision";

/// 拆分写入结果
#[derive(Debug, Clone)]
pub enum DecompositionWrite {
    /// 本次新写入的出餐项
    Inserted(Vec<PreparationItem>),
    /// 订单此前已拆分,未写入任何记录,返回已有出餐项
    AlreadyDecomposed(Vec<PreparationItem>),
}

// ==========================================
// PrepItemRepository - 出餐项仓储
// ==========================================
pub struct PrepItemRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PrepItemRepository {
    /// 创建新的PrepItemRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入一个订单的全部出餐项(幂等)
    ///
    /// # 并发控制
    /// - BEGIN IMMEDIATE 获取写锁后再检查该订单是否已有出餐项
    /// - 已有 → 不写入,返回已有记录
    /// - 全部写入或全部不写入
    pub fn insert_for_order(
        &self,
        order_id: &str,
        items: &[PreparationItem],
    ) -> RepositoryResult<DecompositionWrite> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM prep_item WHERE order_id = ?1",
            params![order_id],
            |row| row.get(0),
        )?;

        if existing > 0 {
            let rows = Self::query_by_order(&tx, order_id)?;
            tx.commit()?;
            return Ok(DecompositionWrite::AlreadyDecomposed(rows));
        }

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO prep_item ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                ITEM_COLUMNS
            ))?;
            for item in items {
                if item.order_id != order_id {
                    return Err(RepositoryError::FieldValueError {
                        field: "prep_item.order_id".to_string(),
                        message: format!("出餐项 {} 不属于订单 {}", item.item_id, order_id),
                    });
                }
                stmt.execute(params![
                    &item.item_id,
                    &item.order_id,
                    &item.order_line_id,
                    &item.station_id,
                    item.quantity,
                    item.state.as_str(),
                    item.priority,
                    &item.notes,
                    item.estimated_minutes,
                    ts_to_db(&item.created_at),
                    opt_ts_to_db(&item.started_at),
                    opt_ts_to_db(&item.finished_at),
                    item.revision,
                ])?;
            }
        }

        tx.commit()?;
        Ok(DecompositionWrite::Inserted(items.to_vec()))
    }

    /// 按ID查询出餐项
    pub fn find_by_id(&self, item_id: &str) -> RepositoryResult<Option<PreparationItem>> {
        let conn = self.get_conn()?;
        let item = conn
            .query_row(
                &format!("SELECT {} FROM prep_item WHERE item_id = ?1", ITEM_COLUMNS),
                params![item_id],
                Self::map_row,
            )
            .optional()?;
        Ok(item)
    }

    /// 查询订单的全部出餐项(含已交付)
    pub fn find_by_order(&self, order_id: &str) -> RepositoryResult<Vec<PreparationItem>> {
        let conn = self.get_conn()?;
        Self::query_by_order(&conn, order_id)
    }

    /// 查询工位上未交付的出餐项
    pub fn find_active_by_station(&self, station_id: &str) -> RepositoryResult<Vec<PreparationItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM prep_item
               WHERE station_id = ?1 AND state != 'delivered'
               ORDER BY priority DESC, created_at ASC, item_id ASC"#,
            ITEM_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![station_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 查询"仍有未交付出餐项"的订单的全部出餐项
    ///
    /// 说明: 返回这些订单的完整出餐项集合(含已交付),进度计算需要全集
    pub fn find_for_active_orders(&self) -> RepositoryResult<Vec<PreparationItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM prep_item
               WHERE order_id IN (
                   SELECT DISTINCT order_id FROM prep_item WHERE state != 'delivered'
               )
               ORDER BY order_id ASC, created_at ASC, item_id ASC"#,
            ITEM_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 单行 compare-and-set 状态推进
    ///
    /// # 参数
    /// - next: 目标快照(state/started_at/finished_at 取自此对象)
    /// - expected_state / expected_revision: 调用方读到的当前值
    ///
    /// # 返回
    /// - Ok(PreparationItem): 写入后的快照(revision = expected_revision + 1)
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: 状态或 revision 已被其他写入方改变
    /// - `RepositoryError::NotFound`: item_id 不存在
    pub fn compare_and_set(
        &self,
        next: &PreparationItem,
        expected_state: PrepState,
        expected_revision: i64,
    ) -> RepositoryResult<PreparationItem> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE prep_item
               SET state = ?1, started_at = ?2, finished_at = ?3, revision = revision + 1
               WHERE item_id = ?4 AND state = ?5 AND revision = ?6"#,
            params![
                next.state.as_str(),
                opt_ts_to_db(&next.started_at),
                opt_ts_to_db(&next.finished_at),
                &next.item_id,
                expected_state.as_str(),
                expected_revision,
            ],
        )?;

        if rows_affected == 0 {
            // 判断是记录不存在还是并发冲突
            let actual: Option<i64> = conn
                .query_row(
                    "SELECT revision FROM prep_item WHERE item_id = ?1",
                    params![&next.item_id],
                    |row| row.get(0),
                )
                .optional()?;

            return Err(match actual {
                Some(actual) => RepositoryError::OptimisticLockFailure {
                    item_id: next.item_id.clone(),
                    expected: expected_revision,
                    actual,
                },
                None => RepositoryError::NotFound {
                    entity: "PreparationItem".to_string(),
                    id: next.item_id.clone(),
                },
            });
        }

        let mut written = next.clone();
        written.revision = expected_revision + 1;
        Ok(written)
    }

    fn query_by_order(conn: &Connection, order_id: &str) -> RepositoryResult<Vec<PreparationItem>> {
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM prep_item
               WHERE order_id = ?1
               ORDER BY created_at ASC, item_id ASC"#,
            ITEM_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![order_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 映射数据库行到PreparationItem对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<PreparationItem> {
        let state_str: String = row.get(5)?;
        let state = PrepState::parse(&state_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                Type::Text,
                format!("未知的出餐项状态: {}", state_str).into(),
            )
        })?;

        Ok(PreparationItem {
            item_id: row.get(0)?,
            order_id: row.get(1)?,
            order_line_id: row.get(2)?,
            station_id: row.get(3)?,
            quantity: row.get(4)?,
            state,
            priority: row.get(6)?,
            notes: row.get(7)?,
            estimated_minutes: row.get(8)?,
            created_at: get_ts(row, 9)?,
            started_at: get_opt_ts(row, 10)?,
            finished_at: get_opt_ts(row, 11)?,
            revision: row.get(12)?,
        })
    }
}
