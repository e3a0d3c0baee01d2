// ==========================================
// 后厨出餐引擎 - 工位注册表(读多写少缓存)
// ==========================================
// 红线: 刷新时先在锁外完成查询,再短暂持写锁替换缓存
// 说明: 停用工位不出现在 list_active,但仍可按ID查到(历史出餐项需要展示)
// ==========================================

use crate::domain::station::Station;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::station_repo::StationRepository;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct Snapshot {
    loaded: bool,
    ordered: Vec<Station>,             // display_order ASC
    by_id: HashMap<String, usize>,     // station_id → ordered 下标
}

// ==========================================
// StationRegistry - 工位注册表
// ==========================================
pub struct StationRegistry {
    repo: Arc<StationRepository>,
    cache: RwLock<Snapshot>,
}

impl StationRegistry {
    pub fn new(repo: Arc<StationRepository>) -> Self {
        Self {
            repo,
            cache: RwLock::new(Snapshot::default()),
        }
    }

    /// 重新加载全部工位
    pub fn refresh(&self) -> RepositoryResult<usize> {
        let stations = self.repo.list_all()?;
        let by_id = stations
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.station_id.clone(), idx))
            .collect();
        let count = stations.len();

        let mut cache = self
            .cache
            .write()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        *cache = Snapshot {
            loaded: true,
            ordered: stations,
            by_id,
        };
        drop(cache);

        tracing::info!(stations = count, "工位注册表已刷新");
        Ok(count)
    }

    fn ensure_loaded(&self) -> RepositoryResult<()> {
        let loaded = self
            .cache
            .read()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?
            .loaded;
        if !loaded {
            self.refresh()?;
        }
        Ok(())
    }

    /// 按ID查询工位(含停用)
    pub fn get(&self, station_id: &str) -> RepositoryResult<Option<Station>> {
        self.ensure_loaded()?;
        let cache = self
            .cache
            .read()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(cache
            .by_id
            .get(station_id)
            .map(|idx| cache.ordered[*idx].clone()))
    }

    /// 工位是否存在(含停用)
    pub fn contains(&self, station_id: &str) -> RepositoryResult<bool> {
        Ok(self.get(station_id)?.is_some())
    }

    /// 启用中的工位,按 display_order 排序
    pub fn list_active(&self) -> RepositoryResult<Vec<Station>> {
        self.ensure_loaded()?;
        let cache = self
            .cache
            .read()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(cache.ordered.iter().filter(|s| s.active).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ensure_schema, open_shared_connection};
    use tempfile::NamedTempFile;

    fn station(id: &str, order: i32, active: bool) -> Station {
        Station {
            station_id: id.to_string(),
            name: id.to_string(),
            display_order: order,
            color: "#888888".to_string(),
            active,
        }
    }

    #[test]
    fn test_cache_and_refresh() {
        let file = NamedTempFile::new().unwrap();
        let conn = open_shared_connection(file.path().to_str().unwrap()).unwrap();
        ensure_schema(&conn.lock().unwrap()).unwrap();

        let repo = Arc::new(StationRepository::new(conn));
        repo.upsert(&station("PLATING", 2, true)).unwrap();
        repo.upsert(&station("GRILL", 1, true)).unwrap();
        repo.upsert(&station("FRYER", 3, false)).unwrap();

        let registry = StationRegistry::new(repo.clone());
        let active: Vec<_> = registry
            .list_active()
            .unwrap()
            .into_iter()
            .map(|s| s.station_id)
            .collect();
        assert_eq!(active, vec!["GRILL", "PLATING"]);
        assert!(registry.contains("FRYER").unwrap());

        // 未刷新前看不到新工位
        repo.upsert(&station("DESSERT", 4, true)).unwrap();
        assert!(!registry.contains("DESSERT").unwrap());
        assert_eq!(registry.refresh().unwrap(), 4);
        assert!(registry.contains("DESSERT").unwrap());
    }
}
