use super::*;

use crate::domain::station::Station;
use crate::engine::views::StationQueue;

impl KitchenApi {
    // ==========================================
    // 工位接口
    // ==========================================

    /// 工位队列
    ///
    /// 工位不在缓存中时刷新一次注册表再判定; 仍不存在返回 NotFound
    pub fn get_station_queue(&self, station_id: &str) -> KitchenResult<StationQueue> {
        if station_id.trim().is_empty() {
            return Err(KitchenError::InvalidInput("station_id不能为空".to_string()));
        }

        if !self.station_registry.contains(station_id)? {
            self.station_registry.refresh()?;
            if !self.station_registry.contains(station_id)? {
                return Err(KitchenError::NotFound(format!("工位{}不存在", station_id)));
            }
        }

        let items = self.item_repo.find_active_by_station(station_id)?;
        Ok(self.projector.station_queue(station_id, &items))
    }

    /// 启用中的工位(按展示顺序)
    pub fn list_stations(&self) -> KitchenResult<Vec<Station>> {
        Ok(self.station_registry.list_active()?)
    }

    /// 重新加载工位注册表(导入工位后调用)
    pub fn refresh_stations(&self) -> KitchenResult<usize> {
        Ok(self.station_registry.refresh()?)
    }
}
