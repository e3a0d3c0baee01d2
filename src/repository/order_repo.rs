// ==========================================
// 后厨出餐引擎 - 订单仓储
// ==========================================
// 红线: 订单生命周期由外部系统驱动,本引擎运行期只读
// 说明: insert_order 供外部接单入口/测试落库使用
// ==========================================

use crate::domain::order::{Order, OrderLine};
use crate::domain::types::OrderStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{get_ts, placeholders, ts_to_db};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const ORDER_COLUMNS: &str = "order_id, placed_at, customer_name, delivery_address, \
                             promised_minutes, order_status, priority";

// ==========================================
// OrderRepository - 订单仓储
// ==========================================
pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRepository {
    /// 创建新的OrderRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入订单头及订单行(同一事务)
    pub fn insert_order(&self, order: &Order) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            &format!(
                "INSERT INTO kitchen_order ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                ORDER_COLUMNS
            ),
            params![
                &order.order_id,
                ts_to_db(&order.placed_at),
                &order.customer_name,
                &order.delivery_address,
                &order.promised_minutes,
                order.order_status.as_str(),
                order.priority,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO order_line (order_line_id, order_id, product_id, quantity, notes)
                   VALUES (?1, ?2, ?3, ?4, ?5)"#,
            )?;
            for line in &order.lines {
                if line.order_id != order.order_id {
                    return Err(RepositoryError::FieldValueError {
                        field: "order_line.order_id".to_string(),
                        message: format!(
                            "订单行 {} 属于订单 {},不属于 {}",
                            line.order_line_id, line.order_id, order.order_id
                        ),
                    });
                }
                stmt.execute(params![
                    &line.order_line_id,
                    &line.order_id,
                    &line.product_id,
                    line.quantity,
                    &line.notes,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// 按ID查询订单(含订单行)
    pub fn find_by_id(&self, order_id: &str) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;

        let order = conn
            .query_row(
                &format!("SELECT {} FROM kitchen_order WHERE order_id = ?1", ORDER_COLUMNS),
                params![order_id],
                Self::map_order_row,
            )
            .optional()?;

        let Some(mut order) = order else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            r#"SELECT order_line_id, order_id, product_id, quantity, notes
               FROM order_line
               WHERE order_id = ?1
               ORDER BY order_line_id ASC"#,
        )?;
        order.lines = stmt
            .query_map(params![order_id], Self::map_line_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(order))
    }

    /// 批量查询订单头(不含订单行)
    pub fn find_headers_by_ids(&self, order_ids: &[String]) -> RepositoryResult<Vec<Order>> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM kitchen_order WHERE order_id IN ({}) ORDER BY placed_at ASC",
            ORDER_COLUMNS,
            placeholders(order_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let orders = stmt
            .query_map(params_from_iter(order_ids.iter()), Self::map_order_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(orders)
    }

    fn map_order_row(row: &rusqlite::Row) -> rusqlite::Result<Order> {
        let status: String = row.get(5)?;
        Ok(Order {
            order_id: row.get(0)?,
            placed_at: get_ts(row, 1)?,
            customer_name: row.get(2)?,
            delivery_address: row.get(3)?,
            promised_minutes: row.get(4)?,
            order_status: OrderStatus::from_str(&status),
            priority: row.get(6)?,
            lines: Vec::new(),
        })
    }

    fn map_line_row(row: &rusqlite::Row) -> rusqlite::Result<OrderLine> {
        Ok(OrderLine {
            order_line_id: row.get(0)?,
            order_id: row.get(1)?,
            product_id: row.get(2)?,
            quantity: row.get(3)?,
            notes: row.get(4)?,
        })
    }
}
