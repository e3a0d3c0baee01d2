// ==========================================
// 后厨出餐引擎 - 工位仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 工位读多写少,运行期只读;写入仅用于导入/初始化
// ==========================================

use crate::domain::station::Station;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// StationRepository - 工位仓储
// ==========================================
pub struct StationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StationRepository {
    /// 创建新的StationRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增或覆盖工位
    pub fn upsert(&self, station: &Station) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO station (station_id, name, display_order, color, active)
               VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT(station_id) DO UPDATE SET
                   name = excluded.name,
                   display_order = excluded.display_order,
                   color = excluded.color,
                   active = excluded.active"#,
            params![
                &station.station_id,
                &station.name,
                station.display_order,
                &station.color,
                station.active,
            ],
        )?;
        Ok(())
    }

    /// 按ID查询工位(含停用工位)
    pub fn find_by_id(&self, station_id: &str) -> RepositoryResult<Option<Station>> {
        let conn = self.get_conn()?;
        let station = conn
            .query_row(
                r#"SELECT station_id, name, display_order, color, active
                   FROM station WHERE station_id = ?1"#,
                params![station_id],
                Self::map_row,
            )
            .optional()?;
        Ok(station)
    }

    /// 查询全部工位,按展示顺序排列
    pub fn list_all(&self) -> RepositoryResult<Vec<Station>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT station_id, name, display_order, color, active
               FROM station
               ORDER BY display_order ASC, station_id ASC"#,
        )?;
        let stations = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stations)
    }

    /// 映射数据库行到Station对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Station> {
        Ok(Station {
            station_id: row.get(0)?,
            name: row.get(1)?,
            display_order: row.get(2)?,
            color: row.get(3)?,
            active: row.get(4)?,
        })
    }
}
