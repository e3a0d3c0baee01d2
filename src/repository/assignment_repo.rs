// ==========================================
// 后厨出餐引擎 - 产品-工位关联仓储
// ==========================================
// 职责: product_station 表的读写
// 说明: 订单拆分通过 StationAssignmentLookup trait 读取,不直接依赖本仓储
// ==========================================

use crate::domain::station::StationAssignment;
use crate::engine::decomposition::{LookupError, StationAssignmentLookup};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::placeholders;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// AssignmentRepository - 产品-工位关联仓储
// ==========================================
pub struct AssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AssignmentRepository {
    /// 创建新的AssignmentRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增或覆盖关联
    pub fn upsert(&self, assignment: &StationAssignment) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO product_station (product_id, station_id, estimated_minutes, complexity)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(product_id, station_id) DO UPDATE SET
                   estimated_minutes = excluded.estimated_minutes,
                   complexity = excluded.complexity"#,
            params![
                &assignment.product_id,
                &assignment.station_id,
                assignment.estimated_minutes,
                assignment.complexity,
            ],
        )?;
        Ok(())
    }

    /// 查询某个产品的全部工位关联
    pub fn find_by_product(&self, product_id: &str) -> RepositoryResult<Vec<StationAssignment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT product_id, station_id, estimated_minutes, complexity
               FROM product_station
               WHERE product_id = ?1
               ORDER BY station_id ASC"#,
        )?;
        let rows = stmt
            .query_map(params![product_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 批量查询多个产品的工位关联
    ///
    /// 返回 product_id → 关联列表; 没有关联的产品不会出现在结果中
    pub fn find_by_products(
        &self,
        product_ids: &[String],
    ) -> RepositoryResult<HashMap<String, Vec<StationAssignment>>> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let conn = self.get_conn()?;
        let sql = format!(
            r#"SELECT product_id, station_id, estimated_minutes, complexity
               FROM product_station
               WHERE product_id IN ({})
               ORDER BY product_id ASC, station_id ASC"#,
            placeholders(product_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(product_ids.iter()), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut map: HashMap<String, Vec<StationAssignment>> = HashMap::new();
        for row in rows {
            map.entry(row.product_id.clone()).or_default().push(row);
        }
        Ok(map)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<StationAssignment> {
        Ok(StationAssignment {
            product_id: row.get(0)?,
            station_id: row.get(1)?,
            estimated_minutes: row.get(2)?,
            complexity: row.get(3)?,
        })
    }
}

// ==========================================
// 订单拆分查询适配
// ==========================================
impl StationAssignmentLookup for AssignmentRepository {
    fn assignments_for(&self, product_id: &str) -> Result<Vec<StationAssignment>, LookupError> {
        self.find_by_product(product_id).map_err(|e| Box::new(e) as LookupError)
    }
}
